//! Message chunk types and the splitter

use serde::{Deserialize, Serialize};

/// Separator between a message id and the chunk index in a chunk id
pub const CHUNK_ID_SEPARATOR: char = '_';

/// One bounded-size fragment of a larger message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageChunk {
    /// `{message_id}_{chunk_index}`
    pub id: String,
    /// Routing key used to pick a processor
    pub message_type: String,
    /// Chunk text
    pub content: String,
    /// True only for the final chunk of a message
    pub is_complete: bool,
    /// Position of this chunk within the message
    pub chunk_index: usize,
    /// Number of chunks the message was split into
    pub total_chunks: usize,
}

impl MessageChunk {
    /// The id of the message this chunk was cut from
    pub fn message_id(&self) -> &str {
        match self.id.rfind(CHUNK_ID_SEPARATOR) {
            Some(pos) => &self.id[..pos],
            None => &self.id,
        }
    }
}

/// Derive the routing key from a message id: everything before the first `_`
pub fn message_type_of(message_id: &str) -> &str {
    message_id
        .split(CHUNK_ID_SEPARATOR)
        .next()
        .unwrap_or(message_id)
}

/// Split `content` into ordered chunks of at most `max_chunk_size` characters.
///
/// The chunk type is derived from the message id. See [`split_typed_message`]
/// to route with an explicit type instead.
pub fn split_message(message_id: &str, content: &str, max_chunk_size: usize) -> Vec<MessageChunk> {
    split_typed_message(
        message_type_of(message_id),
        message_id,
        content,
        max_chunk_size,
    )
}

/// Split `content` into ordered chunks tagged with `message_type`.
///
/// Sizes are counted in chars, so a boundary never lands inside a code point.
/// A `max_chunk_size` of zero disables splitting.
pub fn split_typed_message(
    message_type: &str,
    message_id: &str,
    content: &str,
    max_chunk_size: usize,
) -> Vec<MessageChunk> {
    let char_count = content.chars().count();

    if max_chunk_size == 0 || char_count <= max_chunk_size {
        return vec![MessageChunk {
            id: format!("{}{}0", message_id, CHUNK_ID_SEPARATOR),
            message_type: message_type.to_string(),
            content: content.to_string(),
            is_complete: true,
            chunk_index: 0,
            total_chunks: 1,
        }];
    }

    let total_chunks = char_count.div_ceil(max_chunk_size);
    let mut chunks = Vec::with_capacity(total_chunks);

    // Byte offsets of every chunk start, plus the end of the string.
    let mut bounds: Vec<usize> = content
        .char_indices()
        .step_by(max_chunk_size)
        .map(|(offset, _)| offset)
        .collect();
    bounds.push(content.len());

    for (i, window) in bounds.windows(2).enumerate() {
        chunks.push(MessageChunk {
            id: format!("{}{}{}", message_id, CHUNK_ID_SEPARATOR, i),
            message_type: message_type.to_string(),
            content: content[window[0]..window[1]].to_string(),
            is_complete: i == total_chunks - 1,
            chunk_index: i,
            total_chunks,
        });
    }

    chunks
}
