//! Pure extraction logic: encoding, partitioning, prompting and parsing

pub mod encoder;
pub mod parser;
pub mod partitioner;
pub mod prompt;

pub use encoder::{encode, encode_batch, serialized_size};
pub use parser::{parse_response, strip_code_fence};
pub use partitioner::partition;
pub use prompt::PromptTemplate;
