pub mod accounts;
pub mod clock;
pub mod credentials;
pub mod lifecycle;
pub mod notification_bus;
pub mod provisioner;
pub mod room;

pub use accounts::AccountService;
pub use clock::{Clock, SystemClock};
pub use credentials::{CredentialCipher, CredentialError};
pub use lifecycle::LifecycleManager;
pub use notification_bus::{BroadcastReport, NotificationBus, WaitEvent};
pub use provisioner::{GoogleMeetProvisioner, GoogleMeetSettings, MeetingProvisioner};
pub use room::{RoomService, WaitAdmission};
