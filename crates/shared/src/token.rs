//! Random token generation for invitation links.

/// Length of a generated invitation token.
pub const INVITATION_TOKEN_LEN: usize = 32;

/// Generate a secure invitation token.
///
/// Tokens are URL-safe and avoid visually confusing characters
/// (0, O, 1, l, I) so they survive being read aloud over the phone.
pub fn generate_invitation_token() -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghjkmnpqrstuvwxyz23456789";
    let mut rng = rand::thread_rng();

    (0..INVITATION_TOKEN_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}
