pub mod clock;
pub mod error;
pub mod flight;
pub mod seat;
pub mod passenger;
pub mod booking;
pub mod payment;
pub mod reference;
pub mod repository;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{BookingError, BookingResult, ErrorKind};
pub use flight::{Flight, FlightStatus, NewFlight};
pub use seat::{CabinAvailability, CabinClass, CabinSection, NewSeat, Seat, SeatLayout, SeatStatus};
pub use passenger::{NewPassenger, Passenger, PassengerType, Sex};
pub use booking::{
    Booking, BookingDetails, BookingHandle, BookingStatus, CancellationSummary, NewBooking,
    PaymentStatus, RefundDue, SeatRequest, SettlementOutcome,
};
pub use payment::{ChargeReceipt, ChargeRequest, ChargeStatus, PaymentAdapter, PaymentError};
pub use reference::ReferenceGenerator;
pub use repository::ReservationStore;
