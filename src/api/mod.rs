pub mod backend;
pub mod client;
pub mod types;

pub use backend::{ApiError, ByteStream, ChatBackend};
pub use client::DifyClient;
pub use types::{
    AppInfo, AppParameters, ChunkRecord, FormControl, HistoryRecord, ResponseMode,
    SendMessageRequest, UserInputFormItem,
};
