//! Input conditioning: analog sampling/averaging and switch levels.

pub mod pot;
pub mod switch;

pub use pot::PotSampler;
pub use switch::SwitchInput;
