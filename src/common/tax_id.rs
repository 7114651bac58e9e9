// src/common/tax_id.rs
//
// Validação de identificadores fiscais espanhóis (NIF de pessoa física,
// NIE de estrangeiro e CIF de pessoa jurídica).

use validator::ValidationError;

const DNI_LETTERS: &[u8; 23] = b"TRWAGMYFPDXBNJZSQVHLCKE";
const CIF_CONTROL_LETTERS: &[u8; 10] = b"JABCDEFGHI";

/// Remove espaços, hífens e pontos e coloca em maiúsculas.
pub fn normalize_tax_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.'))
        .flat_map(char::to_uppercase)
        .collect()
}

pub fn is_valid_spanish_tax_id(raw: &str) -> bool {
    let id = normalize_tax_id(raw);
    if id.len() != 9 || !id.is_ascii() {
        return false;
    }

    let bytes = id.as_bytes();
    match bytes[0] {
        b'0'..=b'9' => is_valid_dni(bytes),
        b'X' | b'Y' | b'Z' => {
            // NIE: X/Y/Z viram 0/1/2 e segue a regra do DNI
            let mut dni = bytes.to_vec();
            dni[0] = b'0' + (bytes[0] - b'X');
            is_valid_dni(&dni)
        }
        b'A'..=b'W' => is_valid_cif(bytes),
        _ => false,
    }
}

fn is_valid_dni(bytes: &[u8]) -> bool {
    let (digits, letter) = bytes.split_at(8);
    if !digits.iter().all(u8::is_ascii_digit) {
        return false;
    }
    let number: u32 = digits.iter().fold(0, |acc, d| acc * 10 + u32::from(d - b'0'));
    DNI_LETTERS[(number % 23) as usize] == letter[0]
}

fn is_valid_cif(bytes: &[u8]) -> bool {
    let org = bytes[0];
    if !b"ABCDEFGHJNPQRSUVW".contains(&org) {
        return false;
    }
    let digits = &bytes[1..8];
    if !digits.iter().all(u8::is_ascii_digit) {
        return false;
    }

    let mut sum = 0u32;
    for (i, d) in digits.iter().enumerate() {
        let n = u32::from(d - b'0');
        if i % 2 == 0 {
            // Posições ímpares: dobra e soma os dígitos
            let doubled = n * 2;
            sum += doubled / 10 + doubled % 10;
        } else {
            sum += n;
        }
    }
    let control_digit = (10 - sum % 10) % 10;
    let control_letter = CIF_CONTROL_LETTERS[control_digit as usize];
    let given = bytes[8];

    match org {
        // Só letra
        b'N' | b'P' | b'Q' | b'R' | b'S' | b'W' => given == control_letter,
        // Só dígito
        b'A' | b'B' | b'E' | b'H' => given == b'0' + control_digit as u8,
        _ => given == control_letter || given == b'0' + control_digit as u8,
    }
}

/// Validador customizado para o `validator` (`#[validate(custom(function = ...))]`).
pub fn validate_tax_id(value: &str) -> Result<(), ValidationError> {
    if is_valid_spanish_tax_id(value) {
        Ok(())
    } else {
        let mut err = ValidationError::new("invalid_tax_id");
        err.message = Some("invalid_tax_id".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_dni_and_nie() {
        assert!(is_valid_spanish_tax_id("12345678Z"));
        assert!(is_valid_spanish_tax_id("12.345.678-z"));
        assert!(is_valid_spanish_tax_id("X1234567L"));
        assert!(is_valid_spanish_tax_id("Y1234567X"));
    }

    #[test]
    fn rejects_wrong_control_letter() {
        assert!(!is_valid_spanish_tax_id("12345678A"));
        assert!(!is_valid_spanish_tax_id("X1234567A"));
    }

    #[test]
    fn validates_cif() {
        assert!(is_valid_spanish_tax_id("B12345674"));
        assert!(!is_valid_spanish_tax_id("B12345675"));
        assert!(is_valid_spanish_tax_id("Q2826000H"));
        assert!(!is_valid_spanish_tax_id("Q28260008"));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(!is_valid_spanish_tax_id(""));
        assert!(!is_valid_spanish_tax_id("1234"));
        assert!(!is_valid_spanish_tax_id("ÑÑÑÑÑÑÑÑÑ"));
        assert!(!is_valid_spanish_tax_id("I12345674"));
    }
}
