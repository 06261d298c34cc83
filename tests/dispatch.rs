// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (c) 2025 Opinsys Oy

use rstest::{fixture, rstest};
use std::sync::Mutex;
use swtpm::{
    constants::{TpmAlgId, TpmCc, TpmSe, TPM_RH_NULL, TPM_ST_NO_SESSIONS},
    frame::{encode_command, read_response},
    marshal::{build_to_vec, parse_from_slice},
    message::{
        GetCapabilityCommand, GetCapabilityResponse, NvPublic, ReadPublicResponse,
        StartAuthSessionCommand, StartAuthSessionResponse,
    },
    pcr::PcrSelection,
    process_command, CommandError, TpmCommands, Unimplemented,
};

const FAILURE: [u8; 10] = [0x80, 0x01, 0x00, 0x00, 0x00, 0x0a, 0x00, 0x00, 0x00, 0x01];

/// Answers every command with fixed data and records what it was asked.
#[derive(Debug, Default)]
struct FixedCommands {
    public_size: usize,
    calls: Mutex<Vec<String>>,
}

impl FixedCommands {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl TpmCommands for FixedCommands {
    fn read_public(&self, object_handle: u32) -> Result<ReadPublicResponse, CommandError> {
        self.record(format!("read_public {object_handle:#010x}"));
        if object_handle != 0x8000_0001 {
            return Err(CommandError::Handle(object_handle));
        }
        Ok(ReadPublicResponse {
            public: vec![0x5a; self.public_size],
            name: vec![0x00, 0x0b, 0x01],
            qualified_name: vec![0x00, 0x0b, 0x02],
        })
    }

    fn nv_read_public(&self, nv_index: u32) -> Result<NvPublic, CommandError> {
        self.record(format!("nv_read_public {nv_index:#010x}"));
        Ok(NvPublic {
            nv_index,
            name_alg: TpmAlgId::SHA256,
            attributes: 0x0004_0004,
            auth_policy: vec![],
            data_size: 64,
        })
    }

    fn get_capability_pcrs(
        &self,
        property_count: u32,
        property: u32,
    ) -> Result<Vec<PcrSelection>, CommandError> {
        self.record(format!("get_capability_pcrs {property_count} {property}"));
        Ok(vec![PcrSelection::new(TpmAlgId::SHA256, [0, 1, 2])])
    }

    fn start_auth_session(
        &self,
        cmd: &StartAuthSessionCommand,
    ) -> Result<StartAuthSessionResponse, CommandError> {
        self.record(format!(
            "start_auth_session {:#010x} {:#010x} {} {} {:#04x} {} {}",
            cmd.tpm_key,
            cmd.bind,
            hex::encode(&cmd.nonce_caller),
            hex::encode(&cmd.encrypted_salt),
            cmd.session_type,
            cmd.symmetric,
            cmd.auth_hash
        ));
        Ok(StartAuthSessionResponse {
            session_handle: 0x0300_0000,
            nonce_tpm: vec![0xee; 4],
        })
    }
}

#[fixture]
fn commands() -> FixedCommands {
    FixedCommands {
        public_size: 4,
        ..FixedCommands::default()
    }
}

fn execute<T: TpmCommands>(commands: &T, cc: u32, body: &[u8]) -> Vec<u8> {
    let frame = encode_command(TPM_ST_NO_SESSIONS, cc, body);
    process_command(&mut frame.as_slice(), commands).unwrap()
}

fn success_body(response: &[u8]) -> Vec<u8> {
    let (header, body) = read_response(&mut &response[..]).unwrap();
    assert_eq!(header.tag, TPM_ST_NO_SESSIONS);
    assert_eq!(header.response_code, 0);
    body
}

#[rstest]
fn test_read_public(commands: FixedCommands) {
    let response = execute(&commands, TpmCc::ReadPublic as u32, &[0x80, 0, 0, 1]);
    let body = success_body(&response);
    assert_eq!(
        body,
        vec![0, 4, 0x5a, 0x5a, 0x5a, 0x5a, 0, 3, 0x00, 0x0b, 0x01, 0, 3, 0x00, 0x0b, 0x02]
    );
    assert_eq!(commands.calls(), vec!["read_public 0x80000001"]);
}

#[rstest]
fn test_nv_read_public_is_wrapped(commands: FixedCommands) {
    let response = execute(&commands, TpmCc::NvReadPublic as u32, &[0x01, 0xc0, 0, 0x01]);
    let body = success_body(&response);
    let inner = [
        0x01, 0xc0, 0x00, 0x01, 0x00, 0x0b, 0x00, 0x04, 0x00, 0x04, 0x00, 0x00, 0x00, 0x40,
    ];
    assert_eq!(&body[..2], &[0, 14]);
    assert_eq!(&body[2..], &inner);
}

#[rstest]
fn test_get_capability_pcrs(commands: FixedCommands) {
    let cmd = GetCapabilityCommand {
        cap: 5,
        property: 0,
        property_count: 1,
    };
    let response = execute(
        &commands,
        TpmCc::GetCapability as u32,
        &build_to_vec(&cmd).unwrap(),
    );
    let body = success_body(&response);
    assert_eq!(
        body,
        vec![0, 0, 0, 0, 5, 0, 0, 0, 1, 0x00, 0x0b, 3, 0x07, 0x00, 0x00]
    );
    let parsed: GetCapabilityResponse = parse_from_slice(&body).unwrap();
    assert!(!parsed.more_data);
    assert_eq!(commands.calls(), vec!["get_capability_pcrs 1 0"]);
}

#[rstest]
fn test_start_auth_session(commands: FixedCommands) {
    let cmd = StartAuthSessionCommand {
        tpm_key: TPM_RH_NULL,
        bind: TPM_RH_NULL,
        nonce_caller: vec![0x11; 16],
        encrypted_salt: vec![],
        session_type: TpmSe::Policy as u8,
        symmetric: TpmAlgId::NULL,
        auth_hash: TpmAlgId::SHA256,
    };
    let response = execute(
        &commands,
        TpmCc::StartAuthSession as u32,
        &build_to_vec(&cmd).unwrap(),
    );
    let body = success_body(&response);
    assert_eq!(body, vec![0x03, 0, 0, 0, 0, 4, 0xee, 0xee, 0xee, 0xee]);
    assert_eq!(
        commands.calls(),
        vec![format!(
            "start_auth_session 0x40000007 0x40000007 {} {} 0x01 null sha256",
            "11".repeat(16),
            ""
        )]
    );
}

#[rstest]
#[case::unknown_command(0x0000_017f, vec![])]
#[case::unsupported_capability(TpmCc::GetCapability as u32, vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1])]
#[case::short_payload(TpmCc::ReadPublic as u32, vec![0x80, 0])]
#[case::unknown_handle(TpmCc::ReadPublic as u32, vec![0x80, 0, 0, 2])]
fn test_failure_response(commands: FixedCommands, #[case] cc: u32, #[case] body: Vec<u8>) {
    assert_eq!(execute(&commands, cc, &body), FAILURE);
}

#[rstest]
#[case(0x00)]
#[case(0x01)]
#[case(0x02)]
#[case(0x03)]
#[case(0xff)]
fn test_session_type_reaches_handler(commands: FixedCommands, #[case] session_type: u8) {
    let body = [
        0x40, 0, 0, 7, 0x40, 0, 0, 7, 0, 0, 0, 0, session_type, 0, 0x10, 0, 0x0b,
    ];
    let response = execute(&commands, TpmCc::StartAuthSession as u32, &body);
    success_body(&response);
    assert_eq!(
        commands.calls(),
        vec![format!(
            "start_auth_session 0x40000007 0x40000007   {session_type:#04x} null sha256"
        )]
    );
}

#[test]
fn test_oversized_body_is_failure() {
    let commands = FixedCommands {
        public_size: 4080,
        ..FixedCommands::default()
    };
    let response = execute(&commands, TpmCc::ReadPublic as u32, &[0x80, 0, 0, 1]);
    assert_eq!(response, FAILURE);
}

#[rstest]
#[case(TpmCc::ReadPublic, vec![0x80, 0, 0, 1])]
#[case(TpmCc::NvReadPublic, vec![0x01, 0xc0, 0, 1])]
#[case(TpmCc::GetCapability, vec![0, 0, 0, 5, 0, 0, 0, 0, 0, 0, 0, 1])]
fn test_unimplemented(#[case] cc: TpmCc, #[case] body: Vec<u8>) {
    assert_eq!(execute(&Unimplemented, cc as u32, &body), FAILURE);
}

#[rstest]
fn test_trailing_payload_is_ignored(commands: FixedCommands) {
    let response = execute(
        &commands,
        TpmCc::ReadPublic as u32,
        &[0x80, 0, 0, 1, 0xde, 0xad],
    );
    success_body(&response);
}
