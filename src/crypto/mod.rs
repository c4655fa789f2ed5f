//! Block cipher building blocks and the ECB oracle attack built on top of them.

pub mod aes_128;
pub mod attack;
pub mod modes;
pub mod oracle;
pub mod padding;

pub fn gen_random_bytes(len: usize) -> Vec<u8> {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen()).collect()
}
