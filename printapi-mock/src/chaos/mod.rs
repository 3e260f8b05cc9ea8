//! Chaos behavior engine: the shared behavior, the request log
//! and the responder which answers uploads according to both.

mod behavior;
mod recorder;
mod responder;

pub use self::{
    behavior::{BehaviorPatch, BehaviorStore, ChaosMode},
    recorder::{Attachment, RequestLog},
    responder::UploadResponder,
};
