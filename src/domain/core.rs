mod money;
mod offering;
mod reservation;
mod user;

pub use self::money::*;
pub use self::offering::*;
pub use self::reservation::*;
pub use self::user::*;
