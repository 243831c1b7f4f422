use secp256k1::{Keypair, Secp256k1, SecretKey};

use super::*;
use crate::address::DestinationSignature;

fn identity_from_secret(secret_bytes: [u8; 32]) -> PeerIdentity {
    let secp = Secp256k1::new();
    let secret_key = SecretKey::from_slice(&secret_bytes).unwrap();
    let keypair = Keypair::from_secret_key(&secp, &secret_key);
    PeerIdentity::from_pubkey(keypair.x_only_public_key().0)
}

fn random_identity() -> PeerIdentity {
    let secp = Secp256k1::new();
    let keypair = Keypair::new(&secp, &mut rand::thread_rng());
    PeerIdentity::from_pubkey(keypair.x_only_public_key().0)
}

#[test]
fn test_node_addr_from_pubkey_deterministic() {
    let identity = random_identity();
    let pubkey = identity.pubkey();

    let node_addr1 = NodeAddr::from_pubkey(&pubkey);
    let node_addr2 = NodeAddr::from_pubkey(&pubkey);

    assert_eq!(node_addr1, node_addr2);
    assert_eq!(&node_addr1, identity.node_addr());
}

#[test]
fn test_node_addr_is_truncated_sha256() {
    let identity = identity_from_secret([7u8; 32]);
    let digest = super::sha256(&identity.pubkey().serialize());
    assert_eq!(identity.node_addr().as_bytes(), &digest[..16]);
}

#[test]
fn test_node_addr_from_slice() {
    let bytes = [0u8; 16];
    let node_addr = NodeAddr::from_slice(&bytes).unwrap();
    assert_eq!(node_addr.as_bytes(), &bytes);

    let short = [0u8; 8];
    assert!(matches!(
        NodeAddr::from_slice(&short),
        Err(IdentityError::InvalidNodeAddrLength(8))
    ));
}

#[test]
fn test_peer_identity_from_slice() {
    let identity = random_identity();
    let restored = PeerIdentity::from_slice(&identity.pubkey().serialize()).unwrap();
    assert_eq!(identity, restored);

    assert!(matches!(
        PeerIdentity::from_slice(&[0u8; 5]),
        Err(IdentityError::InvalidPublicKey(_))
    ));
}

#[test]
fn test_peer_identity_displays_node_addr() {
    let identity = identity_from_secret([5u8; 32]);
    assert_eq!(identity.to_string(), identity.node_addr().to_string());
    assert!(identity.to_string().starts_with('<'));
}

#[test]
fn test_destination_hash_deterministic() {
    let identity = identity_from_secret([1u8; 32]);
    let signature = DestinationSignature::parse("fips.probe.echo").unwrap();

    let a = OutboundDestination::new(identity, signature.clone());
    let b = OutboundDestination::new(identity, signature);

    assert_eq!(a.hash(), b.hash());
    assert_eq!(a.kind(), DestinationKind::Single);
}

#[test]
fn test_destination_hash_depends_on_name_and_identity() {
    let alice = identity_from_secret([1u8; 32]);
    let bob = identity_from_secret([2u8; 32]);
    let echo = DestinationSignature::parse("fips.probe.echo").unwrap();
    let other = DestinationSignature::parse("fips.probe.other").unwrap();

    let alice_echo = OutboundDestination::compute_hash(&alice, &echo);
    assert_ne!(alice_echo, OutboundDestination::compute_hash(&bob, &echo));
    assert_ne!(alice_echo, OutboundDestination::compute_hash(&alice, &other));
}

#[test]
fn test_destination_hash_composition() {
    let identity = identity_from_secret([3u8; 32]);
    let signature = DestinationSignature::parse("app.aspect").unwrap();

    let name_digest = super::sha256(b"app.aspect");
    assert_eq!(OutboundDestination::name_hash(&signature), name_digest[..10]);

    let mut material = name_digest[..10].to_vec();
    material.extend_from_slice(identity.node_addr().as_bytes());
    let expected = super::sha256(&material);

    let hash = OutboundDestination::compute_hash(&identity, &signature);
    assert_eq!(hash.as_bytes(), &expected[..16]);
}
