// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy
// Copyright (c) 2024-2025 Jarkko Sakkinen

//! An in-memory command engine.
//!
//! Objects are loaded as opaque public areas, NV indices are defined directly
//! and every allocated bank reports all of its PCRs. Nothing is persisted.

use crate::{
    constants::{
        TpmAlgId, TpmSe, TPM_PCR_COUNT, TPM_RH_HMAC_SESSION_FIRST, TPM_RH_NULL, TPM_RH_OWNER,
        TPM_RH_POLICY_SESSION_FIRST, TPM_RH_TRANSIENT_FIRST,
    },
    error::CommandError,
    handler::TpmCommands,
    message::{NvPublic, ReadPublicResponse, StartAuthSessionCommand, StartAuthSessionResponse},
    pcr::PcrSelection,
};
use log::debug;
use rand::RngCore;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

fn hash<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
    let mut hasher = D::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().to_vec()
}

fn digest(alg: TpmAlgId, parts: &[&[u8]]) -> Result<Vec<u8>, CommandError> {
    match alg {
        TpmAlgId::SHA1 => Ok(hash::<Sha1>(parts)),
        TpmAlgId::SHA256 => Ok(hash::<Sha256>(parts)),
        TpmAlgId::SHA384 => Ok(hash::<Sha384>(parts)),
        TpmAlgId::SHA512 => Ok(hash::<Sha512>(parts)),
        _ => Err(CommandError::Value(format!("unsupported hash {alg}"))),
    }
}

/// `nameAlg || H(data)`
fn make_name(name_alg: TpmAlgId, data: &[&[u8]]) -> Result<Vec<u8>, CommandError> {
    let mut name = u16::from(name_alg).to_be_bytes().to_vec();
    name.extend(digest(name_alg, data)?);
    Ok(name)
}

#[derive(Debug, Clone)]
struct MockObject {
    public: Vec<u8>,
    name: Vec<u8>,
    qualified_name: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
struct MockSession {
    session_type: TpmSe,
}

#[derive(Debug)]
struct MockState {
    objects: HashMap<u32, MockObject>,
    nv_indices: HashMap<u32, NvPublic>,
    sessions: HashMap<u32, MockSession>,
    banks: Vec<TpmAlgId>,
    next_transient_handle: u32,
    next_hmac_session_handle: u32,
    next_policy_session_handle: u32,
}

fn allocate(next: &mut u32) -> Result<u32, CommandError> {
    let handle = *next;
    *next = handle
        .checked_add(1)
        .ok_or_else(|| CommandError::Value("handles exhausted".into()))?;
    Ok(handle)
}

/// A [`TpmCommands`] engine holding its state in memory.
#[derive(Debug)]
pub struct MockTpm {
    state: Mutex<MockState>,
}

impl Default for MockTpm {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTpm {
    /// Creates an engine with SHA-1 and SHA-256 PCR banks.
    #[must_use]
    pub fn new() -> Self {
        Self::with_banks(vec![TpmAlgId::SHA1, TpmAlgId::SHA256])
    }

    /// Creates an engine with the given PCR banks, in reporting order.
    #[must_use]
    pub fn with_banks(banks: Vec<TpmAlgId>) -> Self {
        Self {
            state: Mutex::new(MockState {
                objects: HashMap::new(),
                nv_indices: HashMap::new(),
                sessions: HashMap::new(),
                banks,
                next_transient_handle: TPM_RH_TRANSIENT_FIRST,
                next_hmac_session_handle: TPM_RH_HMAC_SESSION_FIRST,
                next_policy_session_handle: TPM_RH_POLICY_SESSION_FIRST,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads a marshalled `TPMT_PUBLIC` and returns its transient handle.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::Value` if the area is too short to carry a
    /// name algorithm or the name algorithm is not a supported hash.
    pub fn load_public(&self, public: &[u8]) -> Result<u32, CommandError> {
        let Some(name_alg) = public.get(2..4) else {
            return Err(CommandError::Value("public area too short".into()));
        };
        let name_alg = TpmAlgId(u16::from_be_bytes([name_alg[0], name_alg[1]]));
        let name = make_name(name_alg, &[public])?;
        let qualified_name =
            make_name(name_alg, &[&TPM_RH_OWNER.to_be_bytes()[..], name.as_slice()])?;

        let mut state = self.lock();
        let handle = allocate(&mut state.next_transient_handle)?;
        state.objects.insert(
            handle,
            MockObject {
                public: public.to_vec(),
                name,
                qualified_name,
            },
        );
        debug!("loaded object {handle:#010x}");
        Ok(handle)
    }

    /// Defines or replaces an NV index.
    pub fn define_nv(&self, nv_public: NvPublic) {
        let mut state = self.lock();
        state.nv_indices.insert(nv_public.nv_index, nv_public);
    }

    /// Returns the type of an active session.
    #[must_use]
    pub fn session_type(&self, handle: u32) -> Option<TpmSe> {
        self.lock().sessions.get(&handle).map(|s| s.session_type)
    }

    /// Removes a loaded object or an active session.
    ///
    /// There is no `TPM2_FlushContext` route in the dispatcher, so this is a
    /// host-side hook for tests and embedding code.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::Handle` if nothing is loaded at `handle`.
    pub fn flush_context(&self, handle: u32) -> Result<(), CommandError> {
        let mut state = self.lock();
        if state.objects.remove(&handle).is_some() || state.sessions.remove(&handle).is_some() {
            Ok(())
        } else {
            Err(CommandError::Handle(handle))
        }
    }
}

impl TpmCommands for MockTpm {
    fn read_public(&self, object_handle: u32) -> Result<ReadPublicResponse, CommandError> {
        let state = self.lock();
        let Some(object) = state.objects.get(&object_handle) else {
            return Err(CommandError::Handle(object_handle));
        };
        Ok(ReadPublicResponse {
            public: object.public.clone(),
            name: object.name.clone(),
            qualified_name: object.qualified_name.clone(),
        })
    }

    fn nv_read_public(&self, nv_index: u32) -> Result<NvPublic, CommandError> {
        self.lock()
            .nv_indices
            .get(&nv_index)
            .cloned()
            .ok_or(CommandError::Handle(nv_index))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn get_capability_pcrs(
        &self,
        _property_count: u32,
        _property: u32,
    ) -> Result<Vec<PcrSelection>, CommandError> {
        let state = self.lock();
        Ok(state
            .banks
            .iter()
            .map(|&alg| PcrSelection::new(alg, 0..TPM_PCR_COUNT as u32))
            .collect())
    }

    fn start_auth_session(
        &self,
        cmd: &StartAuthSessionCommand,
    ) -> Result<StartAuthSessionResponse, CommandError> {
        let session_type = TpmSe::try_from(cmd.session_type)
            .map_err(|se| CommandError::Value(format!("unsupported session type {se:#04x}")))?;
        let Some(nonce_size) = cmd.auth_hash.digest_size() else {
            return Err(CommandError::Value(format!(
                "unsupported session hash {}",
                cmd.auth_hash
            )));
        };

        let mut state = self.lock();
        if cmd.tpm_key != TPM_RH_NULL && !state.objects.contains_key(&cmd.tpm_key) {
            return Err(CommandError::Handle(cmd.tpm_key));
        }

        let session_handle = match session_type {
            TpmSe::Hmac => allocate(&mut state.next_hmac_session_handle)?,
            TpmSe::Policy | TpmSe::Trial => allocate(&mut state.next_policy_session_handle)?,
        };
        state.sessions.insert(session_handle, MockSession { session_type });

        let mut nonce_tpm = vec![0u8; nonce_size];
        rand::thread_rng().fill_bytes(&mut nonce_tpm);
        debug!("started session {session_handle:#010x}");

        Ok(StartAuthSessionResponse {
            session_handle,
            nonce_tpm,
        })
    }
}
