mod offering;
mod reservation;
mod user;

pub use self::offering::*;
pub use self::reservation::*;
pub use self::user::*;
