// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::convert::TryFrom;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{KernelError, Result};

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;

/// Decimal digits per base-10000 group.
const DEC_DIGITS: usize = 4;

/**
 * Binary form of a PostgreSQL NUMERIC value.
 *
 * <pre>
 * int16 ndigits, int16 weight, uint16 sign, uint16 dscale, int16[ndigits] digits
 * </pre>
 *
 * Digits are base 10000, most significant first, `weight` is the exponent of
 * the first one. Leading and trailing zero groups are not sent; zero has no
 * digits and weight -1.
 */
pub fn encode_numeric(value: &str) -> Result<Bytes> {
    let invalid = || KernelError::InvalidNumeric(value.to_string());
    let text = value.trim();
    let (negative, unsigned) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let (integral, fraction) = match unsigned.find('.') {
        Some(pos) => (&unsigned[..pos], &unsigned[pos + 1..]),
        None => (unsigned, ""),
    };
    let all_digits = |part: &str| part.bytes().all(|each| each.is_ascii_digit());
    if (integral.is_empty() && fraction.is_empty()) || !all_digits(integral) || !all_digits(fraction) {
        return Err(invalid());
    }
    let dscale = u16::try_from(fraction.len()).map_err(|_| invalid())?;
    let integral = integral.trim_start_matches('0');
    let integral_padding = (DEC_DIGITS - integral.len() % DEC_DIGITS) % DEC_DIGITS;
    let fraction_padding = (DEC_DIGITS - fraction.len() % DEC_DIGITS) % DEC_DIGITS;
    let padded = format!("{}{}{}{}", "0".repeat(integral_padding), integral, fraction, "0".repeat(fraction_padding));
    let mut digits: Vec<i16> = padded
        .as_bytes()
        .chunks(DEC_DIGITS)
        .map(|group| group.iter().fold(0i16, |acc, each| acc * 10 + (each - b'0') as i16))
        .collect();
    let mut weight = ((integral.len() + integral_padding) / DEC_DIGITS) as i32 - 1;
    let leading_zeros = digits.iter().take_while(|each| **each == 0).count();
    digits.drain(..leading_zeros);
    weight -= leading_zeros as i32;
    while digits.last() == Some(&0) {
        digits.pop();
    }
    if digits.is_empty() {
        weight = -1;
    }
    let ndigits = i16::try_from(digits.len()).map_err(|_| invalid())?;
    let weight = i16::try_from(weight).map_err(|_| invalid())?;
    let sign = if negative && !digits.is_empty() { NUMERIC_NEG } else { NUMERIC_POS };

    let mut result = BytesMut::with_capacity(8 + digits.len() * 2);
    result.put_i16(ndigits);
    result.put_i16(weight);
    result.put_u16(sign);
    result.put_u16(dscale);
    for each in digits {
        result.put_i16(each);
    }
    Ok(result.freeze())
}

/// Text of a binary NUMERIC, at its display scale.
pub fn decode_numeric(mut buf: &[u8]) -> Result<String> {
    let invalid = |reason: &str| KernelError::InvalidNumeric(reason.to_string());
    if buf.remaining() < 8 {
        return Err(invalid("header shorter than 8 bytes"));
    }
    let ndigits = buf.get_i16();
    let weight = buf.get_i16() as i32;
    let sign = buf.get_u16();
    let dscale = buf.get_u16() as usize;
    if sign == NUMERIC_NAN {
        return Ok("NaN".to_string());
    }
    if ndigits < 0 || buf.remaining() < ndigits as usize * 2 {
        return Err(invalid("digits truncated"));
    }
    let digits: Vec<i16> = (0..ndigits).map(|_| buf.get_i16()).collect();
    if digits.iter().any(|each| !(0..10000).contains(each)) {
        return Err(invalid("digit out of range"));
    }
    let digit_at = |index: i32| -> i16 {
        if index >= 0 && (index as usize) < digits.len() {
            digits[index as usize]
        } else {
            0
        }
    };

    let mut result = String::new();
    if sign == NUMERIC_NEG && digits.iter().any(|each| *each != 0) {
        result.push('-');
    }
    if weight < 0 {
        result.push('0');
    } else {
        result.push_str(&digit_at(0).to_string());
        for index in 1..=weight {
            result.push_str(&format!("{:04}", digit_at(index)));
        }
    }
    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + DEC_DIGITS);
        let groups = (dscale + DEC_DIGITS - 1) / DEC_DIGITS;
        for group in 0..groups as i32 {
            fraction.push_str(&format!("{:04}", digit_at(weight + group + 1)));
        }
        fraction.truncate(dscale);
        result.push('.');
        result.push_str(&fraction);
    }
    Ok(result)
}
