//! Enrollment domain - Payment-gated enrollment in clubs and events.
//!
//! # Core Concepts
//!
//! - **EnrollableItem**: A club (joined) or event (registered for), with a fee
//!   and, for events, an optional capacity
//! - **PaymentIntent**: Gateway-owned two-phase payment (create, confirm)
//! - **Enrollment / PaymentRecord**: Written together by the committer or not at all
//! - **EnrollmentStatus**: Progress streamed to the UI for one request
//!
//! # Free Path
//!
//! Items with a zero fee skip the gateway entirely. The payment record
//! carries a synthetic reference derived from (payer, item, time bucket).

mod confirmation;
mod errors;
mod events;
mod fee;
mod intent;
mod item;
mod payment_record;
mod record;
mod request;
mod status;

pub use confirmation::ConfirmationState;
pub use errors::EnrollmentError;
pub use events::{CapacityExceededAfterCharge, EnrollmentCanceled, EnrollmentCommitted};
pub use fee::{FeeQuote, FeeResolver};
pub use intent::{
    ClientSecret, IntentHandle, IntentId, IntentStatus, PaymentDetails, PaymentIntent,
};
pub use item::{EnrollableItem, ItemKind};
pub use payment_record::{PaymentRecord, PaymentRecordStatus, PaymentRef, PaymentType};
pub use record::{Enrollment, EnrollmentKind, EnrollmentState};
pub use request::EnrollmentRequest;
pub use status::{EnrollmentOutcome, EnrollmentStatus, FailureReason};
