pub mod company;
pub mod daily_entry;
pub mod position;
pub mod stop;

pub use company::{Company, PaymentType};
pub use daily_entry::{DailyEntry, DailyEntryInput};
pub use position::{Coordinate, PositionSample};
pub use stop::{Stop, StopStatus};
