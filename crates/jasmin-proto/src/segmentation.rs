//! Long-content splitting for submit (§4.2 step 5) and the mirrored UDH
//! header layout used when `long_content_split = udh`.

use serde::{Deserialize, Serialize};
use smpp_pdu::ConcatInfo;

use crate::error::JasminError;

/// Single-segment content ceiling in octets (§4.2: "if content > 140
/// bytes (GSM 7-bit: 160 chars equivalent)").
pub const SINGLE_SEGMENT_LIMIT: usize = 140;

const UDH_HEADER_LEN: usize = 6;
const UDH_PART_LEN: usize = SINGLE_SEGMENT_LIMIT - UDH_HEADER_LEN;
const SAR_PART_LEN: usize = SINGLE_SEGMENT_LIMIT - 6;

/// How a long message is split across multiple submit_sm PDUs (§3
/// Connector config `long_content_split`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LongContentSplit {
    /// Concatenation metadata carried out-of-band in `sar_msg_ref_num` /
    /// `sar_total_segments` / `sar_segment_seqnum` TLVs.
    Sar,
    /// Concatenation metadata carried inline as a 6-byte UDH
    /// (`05 00 03 <ref> <total> <seq>`) prefixed to each part's payload.
    Udh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub concat: ConcatInfo,
    /// Wire payload for this part: for `Udh`, the UDH prefix plus the data
    /// slice; for `Sar`, the data slice alone (the UDH indicator in
    /// `esm_class` is left unset and the caller fills the SAR TLVs).
    pub payload: Vec<u8>,
}

/// Split `content` into one or more segments sharing `ref_num`. Returns a
/// single segment with no concatenation metadata if the content already
/// fits in one PDU. Fails with `JasminError::Validation` if the content
/// needs more than `max_parts` segments (§4.2: "up to `long_content_max_parts`
/// (default 5)").
pub fn split(
    content: &[u8],
    scheme: LongContentSplit,
    max_parts: u8,
    ref_num: u16,
) -> Result<Vec<Segment>, JasminError> {
    if content.len() <= SINGLE_SEGMENT_LIMIT {
        return Ok(vec![Segment {
            concat: ConcatInfo {
                ref_num,
                total_segments: 1,
                seq_num: 1,
            },
            payload: content.to_vec(),
        }]);
    }

    let part_len = match scheme {
        LongContentSplit::Sar => SAR_PART_LEN,
        LongContentSplit::Udh => UDH_PART_LEN,
    };

    let total_segments = content.len().div_ceil(part_len);
    if total_segments > max_parts as usize {
        return Err(JasminError::Validation {
            field: "content".to_string(),
            message: format!(
                "content requires {total_segments} segments, exceeding long_content_max_parts={max_parts}"
            ),
        });
    }
    let total_segments = total_segments as u8;

    let mut segments = Vec::with_capacity(total_segments as usize);
    for (i, chunk) in content.chunks(part_len).enumerate() {
        let seq_num = (i + 1) as u8;
        let payload = match scheme {
            LongContentSplit::Sar => chunk.to_vec(),
            LongContentSplit::Udh => {
                let mut buf = Vec::with_capacity(UDH_HEADER_LEN + chunk.len());
                buf.extend_from_slice(&[0x05, 0x00, 0x03, (ref_num & 0xFF) as u8, total_segments, seq_num]);
                buf.extend_from_slice(chunk);
                buf
            }
        };
        segments.push(Segment {
            concat: ConcatInfo {
                ref_num,
                total_segments,
                seq_num,
            },
            payload,
        });
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_is_a_single_unsegmented_part() {
        let segs = split(b"hello", LongContentSplit::Udh, 5, 7).unwrap();
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].concat.total_segments, 1);
        assert_eq!(segs[0].payload, b"hello");
    }

    #[test]
    fn long_content_splits_into_expected_part_count_udh() {
        let content = vec![b'A'; 200];
        let segs = split(&content, LongContentSplit::Udh, 5, 7).unwrap();
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].payload.len(), UDH_HEADER_LEN + UDH_PART_LEN);
        let reassembled: Vec<u8> = segs
            .iter()
            .flat_map(|s| s.payload[UDH_HEADER_LEN..].to_vec())
            .collect();
        assert_eq!(reassembled, content);
    }

    #[test]
    fn long_content_splits_sar_without_udh_prefix() {
        let content = vec![b'A'; 200];
        let segs = split(&content, LongContentSplit::Sar, 5, 7).unwrap();
        assert_eq!(segs.len(), 2);
        let reassembled: Vec<u8> = segs.iter().flat_map(|s| s.payload.clone()).collect();
        assert_eq!(reassembled, content);
    }

    #[test]
    fn exceeding_max_parts_is_rejected() {
        let content = vec![b'A'; 1000];
        let err = split(&content, LongContentSplit::Udh, 5, 7).unwrap_err();
        assert!(matches!(err, JasminError::Validation { .. }));
    }

    #[test]
    fn all_segments_share_ref_num() {
        let content = vec![b'A'; 300];
        let segs = split(&content, LongContentSplit::Sar, 5, 42).unwrap();
        assert!(segs.iter().all(|s| s.concat.ref_num == 42));
    }
}
