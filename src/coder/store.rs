//! `COPY`: the trivial byte-identical passthrough coder.

use std::io::{self, Read, Write};

use super::{method_id, Coder};
use crate::error::ArchiverError;

#[derive(Debug, Default)]
pub struct StoreCoder;

impl StoreCoder {
    pub fn new() -> Self {
        Self
    }
}

impl Coder for StoreCoder {
    fn method_id(&self) -> u64 {
        method_id::COPY
    }

    fn code(
        &mut self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        _declared_input_size: Option<u64>,
        _declared_output_size: Option<u64>,
    ) -> Result<(), ArchiverError> {
        io::copy(input, output)?;
        Ok(())
    }

    // serialize_properties: no properties — default empty-write is correct.
}
