// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy

//! Command and response parameter areas of the supported commands.
//!
//! Each structure both builds and parses, so the dispatcher and the client
//! share a single definition of the wire layout.

use crate::{
    constants::{TpmAlgId, TPM_CAP_PCRS},
    error::MarshalError,
    marshal::{build_to_vec, parse_from_slice, TpmBuild, TpmParse, TpmReader, TpmWriter},
    pcr::{pcr_selection_decode, pcr_selection_encode, PcrSelection},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadPublicCommand {
    pub object_handle: u32,
}

impl TpmBuild for ReadPublicCommand {
    fn build(&self, writer: &mut TpmWriter) -> Result<(), MarshalError> {
        writer.put_u32(self.object_handle);
        Ok(())
    }
}

impl TpmParse for ReadPublicCommand {
    fn parse(reader: &mut TpmReader<'_>) -> Result<Self, MarshalError> {
        Ok(Self {
            object_handle: reader.get_u32()?,
        })
    }
}

/// Result of `TPM2_ReadPublic`.
///
/// `public` holds a marshalled `TPMT_PUBLIC`; the core does not interpret it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadPublicResponse {
    pub public: Vec<u8>,
    pub name: Vec<u8>,
    pub qualified_name: Vec<u8>,
}

impl TpmBuild for ReadPublicResponse {
    fn build(&self, writer: &mut TpmWriter) -> Result<(), MarshalError> {
        writer.put_tpm2b(&self.public)?;
        writer.put_tpm2b(&self.name)?;
        writer.put_tpm2b(&self.qualified_name)
    }
}

impl TpmParse for ReadPublicResponse {
    fn parse(reader: &mut TpmReader<'_>) -> Result<Self, MarshalError> {
        Ok(Self {
            public: reader.get_tpm2b()?,
            name: reader.get_tpm2b()?,
            qualified_name: reader.get_tpm2b()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NvReadPublicCommand {
    pub nv_index: u32,
}

impl TpmBuild for NvReadPublicCommand {
    fn build(&self, writer: &mut TpmWriter) -> Result<(), MarshalError> {
        writer.put_u32(self.nv_index);
        Ok(())
    }
}

impl TpmParse for NvReadPublicCommand {
    fn parse(reader: &mut TpmReader<'_>) -> Result<Self, MarshalError> {
        Ok(Self {
            nv_index: reader.get_u32()?,
        })
    }
}

/// `TPMS_NV_PUBLIC`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NvPublic {
    pub nv_index: u32,
    pub name_alg: TpmAlgId,
    pub attributes: u32,
    pub auth_policy: Vec<u8>,
    pub data_size: u16,
}

impl TpmBuild for NvPublic {
    fn build(&self, writer: &mut TpmWriter) -> Result<(), MarshalError> {
        writer.put_u32(self.nv_index);
        writer.put_u16(self.name_alg.into());
        writer.put_u32(self.attributes);
        writer.put_tpm2b(&self.auth_policy)?;
        writer.put_u16(self.data_size);
        Ok(())
    }
}

impl TpmParse for NvPublic {
    fn parse(reader: &mut TpmReader<'_>) -> Result<Self, MarshalError> {
        Ok(Self {
            nv_index: reader.get_u32()?,
            name_alg: TpmAlgId(reader.get_u16()?),
            attributes: reader.get_u32()?,
            auth_policy: reader.get_tpm2b()?,
            data_size: reader.get_u16()?,
        })
    }
}

/// Result of `TPM2_NV_ReadPublic`: the marshalled `TPMS_NV_PUBLIC` wrapped in
/// one more size prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NvReadPublicResponse {
    pub nv_public: NvPublic,
}

impl TpmBuild for NvReadPublicResponse {
    fn build(&self, writer: &mut TpmWriter) -> Result<(), MarshalError> {
        let inner = build_to_vec(&self.nv_public)?;
        writer.put_tpm2b(&inner)
    }
}

impl TpmParse for NvReadPublicResponse {
    fn parse(reader: &mut TpmReader<'_>) -> Result<Self, MarshalError> {
        let inner = reader.get_tpm2b()?;
        Ok(Self {
            nv_public: parse_from_slice(&inner)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetCapabilityCommand {
    pub cap: u32,
    pub property: u32,
    pub property_count: u32,
}

impl TpmBuild for GetCapabilityCommand {
    fn build(&self, writer: &mut TpmWriter) -> Result<(), MarshalError> {
        writer.put_u32(self.cap);
        writer.put_u32(self.property);
        writer.put_u32(self.property_count);
        Ok(())
    }
}

impl TpmParse for GetCapabilityCommand {
    fn parse(reader: &mut TpmReader<'_>) -> Result<Self, MarshalError> {
        Ok(Self {
            cap: reader.get_u32()?,
            property: reader.get_u32()?,
            property_count: reader.get_u32()?,
        })
    }
}

/// Result of `TPM2_GetCapability` for `TPM_CAP_PCRS`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetCapabilityResponse {
    pub more_data: bool,
    pub pcrs: Vec<PcrSelection>,
}

impl TpmBuild for GetCapabilityResponse {
    fn build(&self, writer: &mut TpmWriter) -> Result<(), MarshalError> {
        let pcrs = pcr_selection_encode(&self.pcrs)?;
        writer.put_u8(u8::from(self.more_data));
        writer.put_u32(TPM_CAP_PCRS);
        writer.put_bytes(&pcrs);
        Ok(())
    }
}

impl TpmParse for GetCapabilityResponse {
    fn parse(reader: &mut TpmReader<'_>) -> Result<Self, MarshalError> {
        let more_data = reader.get_u8()? != 0;
        let cap = reader.get_u32()?;
        if cap != TPM_CAP_PCRS {
            return Err(MarshalError::InvalidValue(format!(
                "capability {cap:#010x}"
            )));
        }
        Ok(Self {
            more_data,
            pcrs: pcr_selection_decode(reader)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartAuthSessionCommand {
    pub tpm_key: u32,
    pub bind: u32,
    pub nonce_caller: Vec<u8>,
    pub encrypted_salt: Vec<u8>,
    /// Raw `TPM_SE` value, interpreted by the command engine.
    pub session_type: u8,
    pub symmetric: TpmAlgId,
    pub auth_hash: TpmAlgId,
}

impl TpmBuild for StartAuthSessionCommand {
    fn build(&self, writer: &mut TpmWriter) -> Result<(), MarshalError> {
        writer.put_u32(self.tpm_key);
        writer.put_u32(self.bind);
        writer.put_tpm2b(&self.nonce_caller)?;
        writer.put_tpm2b(&self.encrypted_salt)?;
        writer.put_u8(self.session_type);
        writer.put_u16(self.symmetric.into());
        writer.put_u16(self.auth_hash.into());
        Ok(())
    }
}

impl TpmParse for StartAuthSessionCommand {
    fn parse(reader: &mut TpmReader<'_>) -> Result<Self, MarshalError> {
        let tpm_key = reader.get_u32()?;
        let bind = reader.get_u32()?;
        let nonce_caller = reader.get_tpm2b()?;
        let encrypted_salt = reader.get_tpm2b()?;
        let session_type = reader.get_u8()?;
        Ok(Self {
            tpm_key,
            bind,
            nonce_caller,
            encrypted_salt,
            session_type,
            symmetric: TpmAlgId(reader.get_u16()?),
            auth_hash: TpmAlgId(reader.get_u16()?),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartAuthSessionResponse {
    pub session_handle: u32,
    pub nonce_tpm: Vec<u8>,
}

impl TpmBuild for StartAuthSessionResponse {
    fn build(&self, writer: &mut TpmWriter) -> Result<(), MarshalError> {
        writer.put_u32(self.session_handle);
        writer.put_tpm2b(&self.nonce_tpm)
    }
}

impl TpmParse for StartAuthSessionResponse {
    fn parse(reader: &mut TpmReader<'_>) -> Result<Self, MarshalError> {
        Ok(Self {
            session_handle: reader.get_u32()?,
            nonce_tpm: reader.get_tpm2b()?,
        })
    }
}
