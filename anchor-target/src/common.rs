pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use approx::AbsDiffEq;
pub use bbox::{AreaConvention, BoxCoder, BoxCoderInit, Rect, RectFloat, RectNum, HW, TLBR};
pub use dashmap::DashMap;
pub use getset::Getters;
pub use itertools::{iproduct, izip, Itertools as _};
pub use label::{GroundTruth, PaddedBoxes, PaddedLabels};
pub use log::{debug, warn};
pub use ndarray::{s, Array1, Array2, Array3, ArrayView2, Axis};
pub use noisy_float::prelude::*;
pub use rand::{prelude::*, rngs::StdRng};
pub use rayon::prelude::*;
pub use serde::{
    de::Error as _, Deserialize, Deserializer, Serialize, Serializer,
};
pub use std::{
    borrow::Borrow,
    cmp::Reverse,
    collections::{BTreeMap, HashSet},
    fmt::Debug,
    num::NonZeroUsize,
    ops::Range,
    path::Path,
    sync::Arc,
};
