mod bullet_points;

pub use bullet_points::{BulletPointPrinter, LineWriter, StdoutLineWriter};
