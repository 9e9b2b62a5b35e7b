use docseal_crypto::{decrypt, encrypt, EncryptionKey, KeyDerivationMethod};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

fn bench_key() -> EncryptionKey {
    EncryptionKey::new([0xABu8; 32], [0x11u8; 32], KeyDerivationMethod::Pbkdf2Sha256)
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_encrypt(bencher: divan::Bencher, size: usize) {
    let key = bench_key();
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| encrypt(divan::black_box(&data), divan::black_box(&key)).unwrap());
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_decrypt(bencher: divan::Bencher, size: usize) {
    let key = bench_key();
    let data = make_data(size);
    let envelope = encrypt(&data, &key).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| decrypt(divan::black_box(&envelope), divan::black_box(&key)).unwrap());
}

fn main() {
    divan::main();
}
