mod bullet_points;
mod prompt;

pub use bullet_points::BulletPointPrinter;
pub use prompt::{confirm, prompt};
