//! Wire protocol for the fault manager.
//!
//! Every message is a fixed 16-byte header followed by `msg_size` payload
//! bytes. Payloads are either a single fixed-size struct, a run of
//! consecutive fixed-size structs (list actions), or a `u32` count followed
//! by records (multi-result responses). All integers are big-endian.

mod alarm;
mod codec;
mod error;
mod header;
mod result_code;
mod wire;

pub use alarm::{
    AlarmFilter, AlarmRecord, AlarmState, Severity, ALARM_RECORD_SIZE, FILTER_SIZE,
};
pub use codec::{
    decode, decode_record_list, decode_text_payload, encode, encode_frame, encode_record_list,
    encode_record_list_into, encode_response, encode_text_payload, record_list_len,
    split_records,
};
pub use error::{ProtocolError, ProtocolResult};
pub use header::{Action, MsgHeader, HEADER_SIZE, MAX_PAYLOAD_SIZE, VERSION};
pub use result_code::ResultCode;
pub use wire::{MAX_TEXT_LEN, TEXT_FIELD_LEN};
