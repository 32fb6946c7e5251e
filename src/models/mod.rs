pub mod appointment;
pub mod conversation;
pub mod enums;
pub mod patient;
pub mod referral;

pub use appointment::*;
pub use conversation::*;
pub use patient::*;
pub use referral::*;
