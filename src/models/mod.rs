pub mod movie;
pub mod hall;
pub mod session;
pub mod booking;

pub use movie::{Movie, NewPrice, Price, SeatType};
pub use hall::{CinemaHall, NewSeat, Seat};
pub use session::{NewSession, Session, UpcomingSession};
pub use booking::{Booking, BookingDetails, BookingStatus, CancelOutcome, NewBooking};
