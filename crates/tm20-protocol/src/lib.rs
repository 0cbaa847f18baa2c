// tm20-protocol: TM20 biometric terminal wire protocol types and codec.
//
// Frames are JSON objects with exactly one of `cmd` (terminal -> hub) or
// `ret` (hub -> terminal) at the root. There is no sub-framing: one JSON
// document per WebSocket text message.

pub mod error;
pub mod inbound;
pub mod outbound;
pub mod response;
pub mod types;

pub use error::ProtocolError;
pub use inbound::{
    parse_command, is_response_frame, CommandFrame, DevInfo, LogRecord, RegMessage,
    SendLogMessage, SendQrCodeMessage, SendUserMessage,
};
pub use outbound::{OutboundCommand, UserNameEntry};
pub use types::{AdminLevel, BackupType, VerifyMode};
