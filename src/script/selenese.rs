use crate::recording::instruction::{CompiledScript, Instruction};

// ============================================================================
// Selenese renderer (Selenium IDE HTML test-case table)
// ============================================================================

/// Render a compiled script as a Selenese test case.
///
/// Produces the table format Selenium IDE imports:
/// ```html
/// <link rel="selenium.base" href="https://example.com" />
/// ...
/// <tr><td>open</td><td>https://example.com/login</td><td></td></tr>
/// <tr><td>type</td><td>id=email</td><td>a@b.c</td></tr>
/// ```
pub fn render_selenese(script: &CompiledScript, title: &str) -> String {
    render_instructions(&script.base_url, &script.instructions, title)
}

pub fn render_instructions(base_url: &str, instructions: &[Instruction], title: &str) -> String {
    let mut rows = String::new();
    for instruction in instructions {
        rows.push_str(&format!(
            "<tr>\n\t<td>{}</td>\n\t<td>{}</td>\n\t<td>{}</td>\n</tr>\n",
            escape_html(instruction.command.as_str()),
            escape_html(&instruction.target),
            escape_html(&instruction.value),
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd">
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="en" lang="en">
<head profile="http://selenium-ide.openqa.org/profiles/test-case">
<meta http-equiv="Content-Type" content="text/html; charset=UTF-8" />
<link rel="selenium.base" href="{base}" />
<title>{title}</title>
</head>
<body>
<table cellpadding="1" cellspacing="1" border="1">
<thead>
<tr><td rowspan="1" colspan="3">{title}</td></tr>
</thead><tbody>
{rows}</tbody></table>
</body>
</html>
"#,
        base = escape_html(base_url),
        title = escape_html(title),
        rows = rows,
    )
}

/// Escape HTML special characters.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
