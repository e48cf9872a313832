pub use anyhow::{bail, ensure, format_err, Context as _, Result};
pub use bbox::{Rect, RectNum, TLBR};
pub use log::warn;
pub use ndarray::{s, Array2, ArrayView2};
pub use serde::{Deserialize, Serialize};
