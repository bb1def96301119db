mod client;
mod error;
mod formatter;
mod history;
mod model;
mod render;
mod session;

pub use client::{
    build_prompt, classify_error, is_usable_credential, normalize_response, LifecycleClient,
    DEFAULT_MODEL, NO_INFORMATION, SYSTEM_INSTRUCTION,
};
pub use error::{CoreError, QueryError, Result};
pub use formatter::{format_text, DisplayBlock, Table, TableRow};
pub use history::{
    FileSlot, HistoryEntry, HistoryList, HistoryStore, MemorySlot, Slot, APP_DIR,
    HISTORY_CAPACITY, HISTORY_KEY,
};
pub use model::{LifecycleResult, Source, DEFAULT_SOURCE_TITLE, DEFAULT_SOURCE_URI};
pub use render::{RenderConfig, TextRenderer};
pub use session::{Effect, ErrorInfo, ErrorKind, Event, Phase, SearchSession, SessionState};

pub use lifecycle_llm::{
    Collaborator, CollaboratorError, GenerateRequest, GenerateResponse, GroundingChunk,
    LlmClient, LlmProvider, WebReference,
};
