//! SMS segmentation limits

/// Characters that fit in a single GSM 7-bit segment
pub const GSM7_SINGLE_SEGMENT_CHARS: usize = 160;

/// Characters per part of a concatenated GSM 7-bit message (UDH takes the rest)
pub const GSM7_MULTIPART_SEGMENT_CHARS: usize = 153;

/// Characters that fit in a single UCS-2 segment
pub const UCS2_SINGLE_SEGMENT_CHARS: usize = 70;

/// Characters per part of a concatenated UCS-2 message
pub const UCS2_MULTIPART_SEGMENT_CHARS: usize = 67;

/// Count the segments needed to carry `content`.
///
/// ASCII text is treated as GSM 7-bit; anything else falls back to UCS-2.
/// Empty content still occupies one segment.
pub fn fragment_count(content: &str) -> usize {
    let (single, multipart) = if content.is_ascii() {
        (GSM7_SINGLE_SEGMENT_CHARS, GSM7_MULTIPART_SEGMENT_CHARS)
    } else {
        (UCS2_SINGLE_SEGMENT_CHARS, UCS2_MULTIPART_SEGMENT_CHARS)
    };

    let chars = content.chars().count();
    if chars <= single {
        1
    } else {
        chars.div_ceil(multipart)
    }
}
