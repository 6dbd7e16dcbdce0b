//! Frame encode/decode and payload helpers.

use crate::alarm::{AlarmRecord, ALARM_RECORD_SIZE};
use crate::header::{Action, MsgHeader, HEADER_SIZE};
use crate::wire::{WireReader, WireWriter, TEXT_FIELD_LEN};
use crate::{ProtocolError, ProtocolResult, ResultCode};

/// Frame a request payload.
pub fn encode(action: Action, payload: &[u8]) -> Vec<u8> {
    encode_response(action, ResultCode::Ok, payload)
}

/// Frame a payload with an explicit result code.
pub fn encode_response(action: Action, rc: ResultCode, payload: &[u8]) -> Vec<u8> {
    encode_frame(&MsgHeader::new(action, payload.len(), rc), payload)
}

/// Frame a payload under an already built header.
pub fn encode_frame(header: &MsgHeader, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&header.encode());
    out.extend_from_slice(payload);
    out
}

/// Split a complete frame into its header and payload.
///
/// The byte count after the header must equal `msg_size` exactly.
pub fn decode(bytes: &[u8]) -> ProtocolResult<(MsgHeader, &[u8])> {
    let header = MsgHeader::decode(bytes)?;
    let payload = &bytes[HEADER_SIZE..];
    if payload.len() != header.payload_len() {
        return Err(ProtocolError::LengthMismatch {
            declared: header.payload_len(),
            actual: payload.len(),
        });
    }
    Ok((header, payload))
}

/// Split a payload into fixed-size elements.
///
/// Rejects the whole payload when it is not an exact multiple of `size`,
/// before any element is handed out.
pub fn split_records(payload: &[u8], size: usize) -> ProtocolResult<Vec<&[u8]>> {
    if size == 0 || payload.len() % size != 0 {
        return Err(ProtocolError::SizeMismatch {
            len: payload.len(),
            record: size,
        });
    }
    Ok(payload.chunks_exact(size).collect())
}

/// Encoded size of a count-prefixed run of `count` records.
pub fn record_list_len(count: usize) -> usize {
    4 + count * ALARM_RECORD_SIZE
}

/// Encode a count-prefixed run of records.
pub fn encode_record_list(records: &[AlarmRecord]) -> ProtocolResult<Vec<u8>> {
    let mut out = Vec::with_capacity(record_list_len(records.len()));
    encode_record_list_into(&mut out, records)?;
    Ok(out)
}

/// Append a count-prefixed run of records to `out`.
///
/// Callers that must survive allocation failure reserve
/// [`record_list_len`] bytes first.
pub fn encode_record_list_into(out: &mut Vec<u8>, records: &[AlarmRecord]) -> ProtocolResult<()> {
    let mut w = WireWriter::append_to(std::mem::take(out));
    w.put_u32(records.len() as u32);
    let written = records.iter().try_for_each(|record| record.write_to(&mut w));
    *out = w.into_bytes();
    written
}

/// Decode a count-prefixed run of records.
pub fn decode_record_list(payload: &[u8]) -> ProtocolResult<Vec<AlarmRecord>> {
    let mut r = WireReader::new(payload);
    let count = r.u32()? as usize;
    let body = r.remaining();
    if body.len() != count.saturating_mul(ALARM_RECORD_SIZE) {
        return Err(ProtocolError::LengthMismatch {
            declared: count.saturating_mul(ALARM_RECORD_SIZE),
            actual: body.len(),
        });
    }
    split_records(body, ALARM_RECORD_SIZE)?
        .into_iter()
        .map(AlarmRecord::decode)
        .collect()
}

/// Encode a single text field payload (entity id, alarm id, uuid).
pub fn encode_text_payload(field: &'static str, value: &str) -> ProtocolResult<Vec<u8>> {
    let mut w = WireWriter::with_capacity(TEXT_FIELD_LEN);
    w.put_text(field, value)?;
    Ok(w.into_bytes())
}

/// Decode a single text field payload.
pub fn decode_text_payload(field: &'static str, payload: &[u8]) -> ProtocolResult<String> {
    if payload.len() != TEXT_FIELD_LEN {
        return Err(ProtocolError::SizeMismatch {
            len: payload.len(),
            record: TEXT_FIELD_LEN,
        });
    }
    WireReader::new(payload).text(field)
}
