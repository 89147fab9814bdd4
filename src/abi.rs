use anyhow::{Result, anyhow};
use sha3::{Digest, Keccak256};

pub const WORD_BYTES: usize = 32;
pub const ADDRESS_BYTES: usize = 20;

pub const TOTAL_SUPPLY: &str = "totalSupply()";
pub const GET_CURRENT_PRICE: &str = "getCurrentPrice()";
pub const BALANCE_OF: &str = "balanceOf(address)";
pub const TOKEN_OF_OWNER_BY_INDEX: &str = "tokenOfOwnerByIndex(address,uint256)";
pub const MINT: &str = "mint(uint256)";

/// First four bytes of the keccak256 hash of a canonical function signature.
pub fn function_selector(signature: &str) -> [u8; 4] {
    assert!(!signature.is_empty(), "Function signature must not be empty");
    let digest = Keccak256::digest(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&digest[..4]);
    selector
}

pub fn encode_uint(value: u128) -> [u8; WORD_BYTES] {
    let mut word = [0u8; WORD_BYTES];
    word[WORD_BYTES - 16..].copy_from_slice(&value.to_be_bytes());
    word
}

pub fn encode_address(address: &str) -> Result<[u8; WORD_BYTES]> {
    let bytes = parse_address(address)?;
    let mut word = [0u8; WORD_BYTES];
    word[WORD_BYTES - ADDRESS_BYTES..].copy_from_slice(&bytes);
    Ok(word)
}

/// Builds `0x`-prefixed calldata for `signature` with pre-encoded arguments.
pub fn encode_call(signature: &str, args: &[[u8; WORD_BYTES]]) -> String {
    let mut data = Vec::with_capacity(4 + args.len() * WORD_BYTES);
    data.extend_from_slice(&function_selector(signature));
    for arg in args {
        data.extend_from_slice(arg);
    }
    format!("0x{}", hex::encode(data))
}

/// Reads the first return word as an unsigned integer.
pub fn decode_uint(output: &str) -> Result<u128> {
    let bytes = hex::decode(strip_hex_prefix(output.trim()))
        .map_err(|err| anyhow!("Failed to decode call output as hex: {err}"))?;
    if bytes.len() < WORD_BYTES {
        return Err(anyhow!(
            "Call output must contain at least one 32 byte word, got {} bytes",
            bytes.len()
        ));
    }
    let word = &bytes[..WORD_BYTES];
    if word[..WORD_BYTES - 16].iter().any(|byte| *byte != 0) {
        return Err(anyhow!("Call output exceeds 128-bit range"));
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[WORD_BYTES - 16..]);
    Ok(u128::from_be_bytes(low))
}

/// Parses a JSON-RPC hex quantity such as `0x1b4`.
pub fn parse_quantity(value: &str) -> Result<u64> {
    let trimmed = value.trim();
    let digits = strip_hex_prefix(trimmed);
    if digits.is_empty() {
        return Err(anyhow!("Hex quantity cannot be empty"));
    }
    u64::from_str_radix(digits, 16).map_err(|err| anyhow!("Invalid hex quantity {trimmed}: {err}"))
}

/// Parses a hex quantity denominated in wei, which routinely exceeds `u64`.
pub fn parse_wei(value: &str) -> Result<u128> {
    let trimmed = value.trim();
    let digits = strip_hex_prefix(trimmed);
    if digits.is_empty() {
        return Err(anyhow!("Hex quantity cannot be empty"));
    }
    u128::from_str_radix(digits, 16).map_err(|err| anyhow!("Invalid wei amount {trimmed}: {err}"))
}

pub fn format_quantity(value: u128) -> String {
    format!("{value:#x}")
}

pub fn parse_address(value: &str) -> Result<[u8; ADDRESS_BYTES]> {
    let trimmed = value.trim();
    if !(trimmed.starts_with("0x") || trimmed.starts_with("0X")) {
        return Err(anyhow!("Address must be 0x-prefixed"));
    }
    let bytes = hex::decode(strip_hex_prefix(trimmed))
        .map_err(|err| anyhow!("Failed to decode address as hex: {err}"))?;
    if bytes.len() != ADDRESS_BYTES {
        return Err(anyhow!(
            "Address must be {ADDRESS_BYTES} bytes, got {}",
            bytes.len()
        ));
    }
    let mut address = [0u8; ADDRESS_BYTES];
    address.copy_from_slice(&bytes);
    Ok(address)
}

pub fn is_valid_address(value: &str) -> bool {
    parse_address(value).is_ok()
}

fn strip_hex_prefix(value: &str) -> &str {
    if value.starts_with("0x") || value.starts_with("0X") {
        &value[2..]
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_match_known_erc721_values() {
        assert_eq!(hex::encode(function_selector(TOTAL_SUPPLY)), "18160ddd");
        assert_eq!(hex::encode(function_selector(BALANCE_OF)), "70a08231");
        assert_eq!(hex::encode(function_selector(MINT)), "a0712d68");
        assert_eq!(
            hex::encode(function_selector(TOKEN_OF_OWNER_BY_INDEX)),
            "2f745c59"
        );
    }

    #[test]
    fn mint_calldata_layout() {
        let data = encode_call(MINT, &[encode_uint(3)]);
        assert_eq!(data.len(), 2 + 2 * (4 + WORD_BYTES));
        assert!(data.starts_with("0xa0712d68"));
        assert!(data.ends_with("03"));
    }

    #[test]
    fn address_words_are_left_padded() {
        let word = encode_address("0x6Aa08b3FA75C395c8cbD23f235992EfedF3A8183").unwrap();
        assert!(word[..12].iter().all(|b| *b == 0));
        assert_eq!(word[12], 0x6a);
        assert!(encode_address("6Aa08b3FA75C395c8cbD23f235992EfedF3A8183").is_err());
        assert!(encode_address("0x1234").is_err());
    }

    #[test]
    fn decodes_uint_words() {
        let word = format!("0x{}", hex::encode(encode_uint(1_000_000_000_000)));
        assert_eq!(decode_uint(&word).unwrap(), 1_000_000_000_000);
        assert!(decode_uint("0x01").is_err());
        let overflow = format!("0x{}{}", "01", "00".repeat(31));
        assert!(decode_uint(&overflow).is_err());
    }

    #[test]
    fn hex_quantities() {
        assert_eq!(parse_quantity("0x1b4").unwrap(), 436);
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert!(parse_quantity("0x").is_err());
        assert!(parse_quantity("0xzz").is_err());
        assert_eq!(format_quantity(500_000), "0x7a120");
        assert_eq!(format_quantity(0), "0x0");
        assert_eq!(
            parse_wei("0x1bc16d674ec80000").unwrap(),
            2_000_000_000_000_000_000
        );
        assert_eq!(parse_wei("0x3635c9adc5dea00000").unwrap(), 1_000 * 10u128.pow(18));
        assert!(parse_wei("0x").is_err());
    }

    #[test]
    fn address_validation() {
        assert!(is_valid_address("0x0000000000000000000000000000000000000001"));
        assert!(!is_valid_address("0xabc"));
        assert!(!is_valid_address(""));
    }
}
