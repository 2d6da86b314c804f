/// Abbreviate a count for display: `12345` becomes `"12K"`.
///
/// The suffix is picked from the exponent of the value rounded to two
/// significant digits, so `999` is shown as `"1K"`. The scaled value is
/// rounded half away from zero to `fixed` decimal places.
pub fn abbreviate_number(num: Option<f64>, fixed: usize) -> Option<String> {
    const SUFFIXES: [&str; 5] = ["", "K", "M", "B", "T"];

    let num = num?;
    if num == 0.0 {
        return Some("0".to_string());
    }

    let k = (two_digit_exponent(num).min(14) / 3).max(0) as usize;
    let scaled = num / 10f64.powi(k as i32 * 3);

    let factor = 10f64.powi(fixed as i32);
    let mut rounded = (scaled * factor).round() / factor;
    if rounded == 0.0 {
        // drop the sign of -0
        rounded = 0.0;
    }

    Some(format!("{}{}", trim_decimal(rounded, fixed), SUFFIXES[k]))
}

/// Base-10 exponent of `num` written with two significant digits
fn two_digit_exponent(num: f64) -> i32 {
    let repr = format!("{:.1e}", num.abs());
    repr.split_once('e')
        .and_then(|(_, exp)| exp.parse::<i32>().ok())
        .unwrap_or(0)
}

fn trim_decimal(value: f64, fixed: usize) -> String {
    let s = format!("{:.*}", fixed, value);
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}
