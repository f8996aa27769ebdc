use crate::codec::{StubInput, StubOutput};
use crate::error::CodecError;
use crate::indexing::IndexSink;
use crate::serializer::StubSerializer;
use stubscope_api::models::{IndexKey, IndexValue, StubField, StubNode};

const TAG_NAME: u8 = 0;
const TAG_TEXT: u8 = 1;
const TAG_BOOL: u8 = 2;
const TAG_INT: u8 = 3;

/// Serializer for stub types whose payload is a plain list of [`StubField`]s.
///
/// Layout: `varint(field count)` followed by one tag byte and the value per field.
/// Optional index rules map a field position to an [`IndexKey`].
#[derive(Debug, Clone)]
pub struct FieldStubSerializer {
    external_id: String,
    index_rules: Vec<(usize, IndexKey)>,
}

impl FieldStubSerializer {
    pub fn new(external_id: &str) -> Self {
        Self {
            external_id: external_id.to_string(),
            index_rules: Vec::new(),
        }
    }

    /// Index the value of field `field_idx` under `key`.
    pub fn indexing(mut self, field_idx: usize, key: IndexKey) -> Self {
        self.index_rules.push((field_idx, key));
        self
    }
}

impl StubSerializer for FieldStubSerializer {
    fn external_id(&self) -> &str {
        &self.external_id
    }

    fn serialize(&self, node: &StubNode, out: &mut StubOutput<'_>) -> Result<(), CodecError> {
        out.write_varint(node.fields.len() as u64);
        for field in &node.fields {
            match field {
                StubField::Name(name) => {
                    out.write_byte(TAG_NAME);
                    out.write_name(name.as_deref())?;
                }
                StubField::Text(text) => {
                    out.write_byte(TAG_TEXT);
                    out.write_utf(text);
                }
                StubField::Bool(b) => {
                    out.write_byte(TAG_BOOL);
                    out.write_bool(*b);
                }
                StubField::Int(v) => {
                    out.write_byte(TAG_INT);
                    out.write_i64(*v);
                }
            }
        }
        Ok(())
    }

    fn deserialize(&self, input: &mut StubInput<'_>) -> Result<StubNode, CodecError> {
        let count = input.read_varint()? as usize;
        let mut node = StubNode::new(&self.external_id);
        node.fields.reserve(count.min(64));
        for _ in 0..count {
            let field = match input.read_byte()? {
                TAG_NAME => StubField::Name(input.read_name()?),
                TAG_TEXT => StubField::Text(input.read_utf()?),
                TAG_BOOL => StubField::Bool(input.read_bool()?),
                TAG_INT => StubField::Int(input.read_i64()?),
                tag => {
                    return Err(CodecError::Malformed(format!(
                        "unknown field tag {} in {}",
                        tag, self.external_id
                    )));
                }
            };
            node.fields.push(field);
        }
        Ok(node)
    }

    fn index_stub(&self, node: &StubNode, sink: &mut dyn IndexSink) {
        for (field_idx, key) in &self.index_rules {
            let value = match node.field(*field_idx) {
                Some(StubField::Name(Some(name))) => IndexValue::Str(name.clone()),
                Some(StubField::Text(text)) => IndexValue::Str(text.clone()),
                Some(StubField::Int(v)) => IndexValue::Int(*v),
                _ => continue,
            };
            sink.occurrence(key, value);
        }
    }
}
