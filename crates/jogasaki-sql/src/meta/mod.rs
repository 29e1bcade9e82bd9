//! Type metadata: field types and record layouts.

mod field_type;
mod record_meta;

pub use field_type::{
    CharacterFieldOption, DecimalFieldOption, FieldType, FieldTypeKind, OctetFieldOption,
    TimeOfDayFieldOption, TimePointFieldOption,
};
pub use record_meta::RecordMeta;
