//! Identity resolution for ungated rooms.
//!
//! Gated rooms never reach the resolver: the accredited phone number is the
//! identity. For ungated rooms the authenticated caller id wins; anonymous
//! callers get a fingerprint over network origin and client signature. The
//! fingerprint is a dedup heuristic that a motivated attacker can defeat by
//! changing either signal.

use roomvote_crypto::fingerprint_hex;
use roomvote_types::{CallerId, PhoneNumber, Room, VoterIdentity};

use crate::EngineError;

/// Marker used when a request carries no origin or signature.
const UNKNOWN_SIGNAL: &str = "unknown";

/// The signals a transport can hand to the engine for one request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Principal resolved by the external auth layer, if any.
    pub caller: Option<CallerId>,
    /// Network origin (client IP).
    pub origin: Option<String>,
    /// Client signature (user agent).
    pub client_signature: Option<String>,
}

impl RequestContext {
    pub fn anonymous(origin: impl Into<String>, client_signature: impl Into<String>) -> Self {
        Self {
            caller: None,
            origin: Some(origin.into()),
            client_signature: Some(client_signature.into()),
        }
    }

    pub fn authenticated(caller: CallerId) -> Self {
        Self {
            caller: Some(caller),
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityResolver {
    fingerprint_includes_caller: bool,
}

impl IdentityResolver {
    pub fn new(fingerprint_includes_caller: bool) -> Self {
        Self {
            fingerprint_includes_caller,
        }
    }

    /// Resolve the identity for an ungated room. Never fails; missing signals
    /// degrade to a shared "unknown" marker.
    pub fn resolve(&self, ctx: &RequestContext) -> VoterIdentity {
        if let (Some(caller), false) = (&ctx.caller, self.fingerprint_includes_caller) {
            return VoterIdentity::Authenticated(caller.clone());
        }
        let origin = non_empty(ctx.origin.as_deref()).unwrap_or(UNKNOWN_SIGNAL);
        let signature = non_empty(ctx.client_signature.as_deref()).unwrap_or(UNKNOWN_SIGNAL);
        let caller = ctx.caller.as_ref().map(CallerId::as_str);
        VoterIdentity::Fingerprint(fingerprint_hex(origin, signature, caller))
    }

    /// Pick the identity a vote in `room` is recorded under.
    pub fn for_room(
        &self,
        room: &Room,
        ctx: &RequestContext,
        phone: Option<&str>,
    ) -> Result<VoterIdentity, EngineError> {
        if !room.gated {
            return Ok(self.resolve(ctx));
        }
        let raw = non_empty(phone).ok_or_else(|| {
            EngineError::Validation("phone number is required for this room".into())
        })?;
        let phone = PhoneNumber::parse(raw).map_err(|e| EngineError::Validation(e.to_string()))?;
        Ok(VoterIdentity::Accredited(phone))
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomvote_types::{RoomId, Timestamp};

    fn room(gated: bool) -> Room {
        let mut room = Room::new(
            RoomId::parse("r").unwrap(),
            "t".into(),
            "d".into(),
            vec!["a".into(), "b".into()],
            Timestamp::new(100),
            CallerId::new("creator").unwrap(),
            Timestamp::new(0),
        );
        room.gated = gated;
        room
    }

    #[test]
    fn authenticated_caller_is_the_identity() {
        let ctx = RequestContext {
            caller: Some(CallerId::new("u1").unwrap()),
            origin: Some("1.2.3.4".into()),
            client_signature: Some("ua".into()),
        };
        assert_eq!(
            IdentityResolver::default().resolve(&ctx),
            VoterIdentity::Authenticated(CallerId::new("u1").unwrap())
        );
    }

    #[test]
    fn anonymous_fingerprint_is_stable() {
        let resolver = IdentityResolver::default();
        let a = resolver.resolve(&RequestContext::anonymous("1.2.3.4", "ua"));
        let b = resolver.resolve(&RequestContext::anonymous("1.2.3.4", "ua"));
        let c = resolver.resolve(&RequestContext::anonymous("1.2.3.5", "ua"));
        assert!(matches!(a, VoterIdentity::Fingerprint(_)));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn missing_signals_fall_back_to_unknown() {
        let resolver = IdentityResolver::default();
        let empty = resolver.resolve(&RequestContext::default());
        let blank = resolver.resolve(&RequestContext::anonymous("  ", ""));
        assert_eq!(empty, blank);
    }

    #[test]
    fn caller_folded_into_fingerprint_when_configured() {
        let resolver = IdentityResolver::new(true);
        let ctx = RequestContext {
            caller: Some(CallerId::new("u1").unwrap()),
            ..RequestContext::anonymous("1.2.3.4", "ua")
        };
        let id = resolver.resolve(&ctx);
        assert!(matches!(id, VoterIdentity::Fingerprint(_)));
        assert_ne!(id, resolver.resolve(&RequestContext::anonymous("1.2.3.4", "ua")));
    }

    #[test]
    fn gated_room_requires_valid_phone() {
        let resolver = IdentityResolver::default();
        let ctx = RequestContext::default();
        assert!(matches!(
            resolver.for_room(&room(true), &ctx, None),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            resolver.for_room(&room(true), &ctx, Some("abc")),
            Err(EngineError::Validation(_))
        ));
        assert_eq!(
            resolver.for_room(&room(true), &ctx, Some("+15550001")).unwrap(),
            VoterIdentity::Accredited(PhoneNumber::parse("+15550001").unwrap())
        );
    }

    #[test]
    fn ungated_room_ignores_phone() {
        let resolver = IdentityResolver::default();
        let ctx = RequestContext::anonymous("ip", "ua");
        let id = resolver.for_room(&room(false), &ctx, Some("+15550001")).unwrap();
        assert!(matches!(id, VoterIdentity::Fingerprint(_)));
    }
}
