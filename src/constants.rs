// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy

//! Wire constants shared by the codecs, the dispatcher and the clients.

use std::fmt;

/// Size of both the command and the response header.
pub const TPM_HEADER_SIZE: usize = 10;

/// Largest command or response frame accepted on the wire.
pub const TPM_MAX_COMMAND_SIZE: usize = 4096;

/// Number of bytes in a PCR select bitmask.
pub const TPM_PCR_SELECT_SIZE: usize = 3;

/// Number of PCRs addressable by a select bitmask.
pub const TPM_PCR_COUNT: usize = TPM_PCR_SELECT_SIZE * 8;

pub const TPM_ST_NO_SESSIONS: u16 = 0x8001;
pub const TPM_ST_SESSIONS: u16 = 0x8002;

pub const TPM_RC_SUCCESS: u32 = 0x0000_0000;

/// Response code carried by every command-level failure.
pub const TPM_RC_GENERIC_FAILURE: u32 = TPM_RC_SUCCESS + 1;

pub const TPM_CAP_PCRS: u32 = 0x0000_0005;

pub const TPM_RH_OWNER: u32 = 0x4000_0001;
pub const TPM_RH_NULL: u32 = 0x4000_0007;
pub const TPM_RH_TRANSIENT_FIRST: u32 = 0x8000_0000;
pub const TPM_RH_HMAC_SESSION_FIRST: u32 = 0x0200_0000;
pub const TPM_RH_POLICY_SESSION_FIRST: u32 = 0x0300_0000;

/// Command codes understood by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TpmCc {
    NvReadPublic = 0x0000_0169,
    ReadPublic = 0x0000_0173,
    StartAuthSession = 0x0000_0176,
    GetCapability = 0x0000_017A,
}

impl TryFrom<u32> for TpmCc {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0x0000_0169 => Ok(Self::NvReadPublic),
            0x0000_0173 => Ok(Self::ReadPublic),
            0x0000_0176 => Ok(Self::StartAuthSession),
            0x0000_017A => Ok(Self::GetCapability),
            _ => Err(value),
        }
    }
}

impl fmt::Display for TpmCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NvReadPublic => write!(f, "TPM2_NV_ReadPublic"),
            Self::ReadPublic => write!(f, "TPM2_ReadPublic"),
            Self::StartAuthSession => write!(f, "TPM2_StartAuthSession"),
            Self::GetCapability => write!(f, "TPM2_GetCapability"),
        }
    }
}

/// A TPM algorithm identifier.
///
/// Kept open-ended: the core passes algorithm identifiers through to the
/// command handler without validating them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TpmAlgId(pub u16);

impl TpmAlgId {
    pub const ERROR: Self = Self(0x0000);
    pub const RSA: Self = Self(0x0001);
    pub const SHA1: Self = Self(0x0004);
    pub const AES: Self = Self(0x0006);
    pub const SHA256: Self = Self(0x000B);
    pub const SHA384: Self = Self(0x000C);
    pub const SHA512: Self = Self(0x000D);
    pub const NULL: Self = Self(0x0010);
    pub const ECC: Self = Self(0x0023);
    pub const CFB: Self = Self(0x0043);

    /// Returns the digest size of a hash algorithm, or `None` if the
    /// identifier is not a supported hash.
    #[must_use]
    pub const fn digest_size(self) -> Option<usize> {
        match self {
            Self::SHA1 => Some(20),
            Self::SHA256 => Some(32),
            Self::SHA384 => Some(48),
            Self::SHA512 => Some(64),
            _ => None,
        }
    }
}

impl From<u16> for TpmAlgId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<TpmAlgId> for u16 {
    fn from(value: TpmAlgId) -> Self {
        value.0
    }
}

impl fmt::Display for TpmAlgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::RSA => write!(f, "rsa"),
            Self::SHA1 => write!(f, "sha1"),
            Self::AES => write!(f, "aes"),
            Self::SHA256 => write!(f, "sha256"),
            Self::SHA384 => write!(f, "sha384"),
            Self::SHA512 => write!(f, "sha512"),
            Self::NULL => write!(f, "null"),
            Self::ECC => write!(f, "ecc"),
            Self::CFB => write!(f, "cfb"),
            Self(raw) => write!(f, "{raw:#06x}"),
        }
    }
}

/// Session types accepted by `TPM2_StartAuthSession`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TpmSe {
    Hmac = 0x00,
    Policy = 0x01,
    Trial = 0x03,
}

impl TryFrom<u8> for TpmSe {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(Self::Hmac),
            0x01 => Ok(Self::Policy),
            0x03 => Ok(Self::Trial),
            _ => Err(value),
        }
    }
}
