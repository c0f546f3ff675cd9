//! Connection to the remote authority: wire types, codec, transport, session

pub mod codec;
pub mod protocol;
pub mod session;
pub mod transport;

pub use codec::{decode, encode, CodecError};
pub use protocol::{ClientMsg, PlayerId, RemotePlayer, ServerEvent};
pub use session::{CloseReason, ConnectionState, Session, SessionError, SessionEvent};
pub use transport::{Connector, Link, TransportEvent, TransportEventKind, WsConnector};
