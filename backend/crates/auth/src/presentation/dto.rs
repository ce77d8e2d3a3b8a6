//! Request/Response DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::{SignInOutput, VerifyTotpOutput};
use crate::domain::value_object::role::Role;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login outcome: enrollment payload or challenge prompt, never both
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum LoginResponse {
    #[serde(rename_all = "camelCase")]
    EnrollmentRequired {
        qr_code: String,
        secret: String,
        otpauth_url: String,
    },
    #[serde(rename_all = "camelCase")]
    ChallengeRequired { identity_ref: Uuid },
}

impl From<SignInOutput> for LoginResponse {
    fn from(output: SignInOutput) -> Self {
        match output {
            SignInOutput::EnrollmentRequired(p) => LoginResponse::EnrollmentRequired {
                qr_code: p.qr_code_base64,
                secret: p.secret_base32,
                otpauth_url: p.otpauth_url,
            },
            SignInOutput::ChallengeRequired { identity_ref } => {
                LoginResponse::ChallengeRequired { identity_ref }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub email: String,
    pub code: String,
}

/// Public identity fields; never the hash or the TOTP secret
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySummary {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub access_token: String,
    pub identity: IdentitySummary,
}

impl VerifyResponse {
    pub fn from_output(output: &VerifyTotpOutput) -> Self {
        Self {
            access_token: output.tokens.access.clone(),
            identity: IdentitySummary {
                id: output.identity_id,
                email: output.email.clone(),
                full_name: output.full_name.clone(),
                role: output.role,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}
