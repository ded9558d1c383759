//! Network messages for the orchestration protocol.
//!
//! Every exchange is a correlated request/response pair carried over HTTP
//! POST with a JSON body. Requests carry a `method` tag and a `params`
//! payload; responses carry a `response` tag and a `result` payload. The
//! two tag families are bound by a fixed table ([`Method::response_kind`]):
//!
//! | method      | response   |
//! |-------------|------------|
//! | hello       | info       |
//! | action      | evaluation |
//! | instruction | snapshot   |
//! | task        | report     |
//! | layout      | vnfbr      |
//! | deploy      | built      |
//!
//! Transport metadata (sender, destination, routing prefix) lives on the
//! [`Envelope`] but never serializes onto the wire; the routing prefix
//! travels in the URL path instead.

mod envelope;
mod request;
mod response;

pub use envelope::{next_message_id, unix_timestamp, Envelope, ParseError, Payload};
pub use request::{
    ActionSpec, Deploy, DeployRequest, Hello, Instruction, Layout, LayoutRef, Method, OnError,
    Request, Stimulus, Task, ToolSelection,
};
pub use response::{
    Built, BuiltAck, ErrorInfo, Evaluation, HostInfo, Info, Report, Response, ResponseKind,
    Snapshot, Vnfbr,
};
