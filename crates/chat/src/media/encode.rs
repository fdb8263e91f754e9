use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use parley_llm::Attachment;

/// Reads `attachment` and encodes it as a self-contained `data:` URI.
pub async fn to_data_uri(attachment: &Attachment) -> std::io::Result<String> {
    let bytes = attachment.read().await?;
    Ok(encode_data_uri(attachment.mime_type(), &bytes))
}

pub fn encode_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}
