// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy
// Copyright (c) 2024-2025 Jarkko Sakkinen

//! PCR selection lists (`TPML_PCR_SELECTION`).

use crate::{
    constants::{TpmAlgId, TPM_PCR_COUNT, TPM_PCR_SELECT_SIZE},
    error::MarshalError,
    marshal::{TpmReader, TpmWriter},
};

/// Represents a selection of PCR indices for a specific bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcrSelection {
    pub alg: TpmAlgId,
    pub indices: Vec<u32>,
}

impl PcrSelection {
    #[must_use]
    pub fn new(alg: TpmAlgId, indices: impl IntoIterator<Item = u32>) -> Self {
        Self {
            alg,
            indices: indices.into_iter().collect(),
        }
    }

    fn to_select_bytes(&self) -> Result<[u8; TPM_PCR_SELECT_SIZE], MarshalError> {
        let mut pcr_select = [0u8; TPM_PCR_SELECT_SIZE];
        for &pcr_index in &self.indices {
            let index = pcr_index as usize;
            if index >= TPM_PCR_COUNT {
                return Err(MarshalError::PcrIndexOutOfRange(pcr_index));
            }
            pcr_select[index / 8] |= 1 << (index % 8);
        }
        Ok(pcr_select)
    }
}

/// Encodes a list of selections with a fixed three byte select per bank.
///
/// A selection with no indices collapses the whole list to an empty one,
/// which is how TPM clients expect an unpopulated bank to be reported.
///
/// # Errors
///
/// Returns `MarshalError::PcrIndexOutOfRange` if an index does not fit the
/// select bitmask.
#[allow(clippy::cast_possible_truncation)]
pub fn pcr_selection_encode(selections: &[PcrSelection]) -> Result<Vec<u8>, MarshalError> {
    let mut body = TpmWriter::new();
    for selection in selections {
        if selection.indices.is_empty() {
            let mut empty = TpmWriter::new();
            empty.put_u32(0);
            return Ok(empty.into_vec());
        }
        let pcr_select = selection.to_select_bytes()?;
        body.put_u16(selection.alg.into());
        body.put_u8(TPM_PCR_SELECT_SIZE as u8);
        body.put_bytes(&pcr_select);
    }

    let count =
        u32::try_from(selections.len()).map_err(|_| MarshalError::Capacity(selections.len()))?;
    let mut writer = TpmWriter::new();
    writer.put_u32(count);
    writer.put_bytes(&body.into_vec());
    Ok(writer.into_vec())
}

/// Decodes a list of selections. The select size of each bank is taken from
/// the wire, and the indices of each bank are returned in ascending order.
///
/// # Errors
///
/// Returns a `MarshalError` if the list is truncated.
pub fn pcr_selection_decode(reader: &mut TpmReader<'_>) -> Result<Vec<PcrSelection>, MarshalError> {
    let count = reader.get_u32()?;
    let mut selections = Vec::new();
    for _ in 0..count {
        let alg = TpmAlgId(reader.get_u16()?);
        let size = reader.get_u8()? as usize;
        let pcr_select = reader.get_bytes(size)?;
        let mut indices = Vec::new();
        for (byte_idx, &byte) in pcr_select.iter().enumerate() {
            for bit_idx in 0..8 {
                if (byte >> bit_idx) & 1 == 1 {
                    let pcr_index = u32::try_from(byte_idx * 8 + bit_idx)
                        .map_err(|_| MarshalError::InvalidValue("PCR index overflow".into()))?;
                    indices.push(pcr_index);
                }
            }
        }
        selections.push(PcrSelection { alg, indices });
    }
    Ok(selections)
}
