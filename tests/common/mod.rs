//! Shared NZB fixtures for the integration tests

#![allow(dead_code)]

/// One file, two segments, category TV
pub const BIG_BUCK_BUNNY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nzb PUBLIC "-//newzBin//DTD NZB 1.1//EN" "http://www.newzbin.com/DTD/nzb/nzb-1.1.dtd">
<nzb xmlns="http://www.newzbin.com/DTD/2003/nzb">
    <head>
        <meta type="title">Big Buck Bunny - S01E01.mkv</meta>
        <meta type="password">secret</meta>
        <meta type="tag">HD</meta>
        <meta type="category">TV</meta>
    </head>
    <file poster="John &lt;nzb@nowhere.example&gt;" date="1706440708" subject="[1/5] - &quot;Big Buck Bunny - S01E01.mkv&quot; yEnc (1/24) 16981056">
        <groups>
            <group>alt.binaries.boneless</group>
        </groups>
        <segments>
            <segment bytes="739549" number="2">70a3a038ce324e618e2751e063d6a036-7285710986748@example</segment>
            <segment bytes="739067" number="1">9cacde4c986547369becbf97003fb2c5-9483514693959@example</segment>
        </segments>
    </file>
</nzb>
"#;

/// Same release without a `<head>` block
pub const NO_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<nzb xmlns="http://www.newzbin.com/DTD/2003/nzb">
  <file poster="John &lt;nzb@nowhere.example&gt;" date="1706440708" subject="[1/1] - &quot;Big Buck Bunny - S01E01.mkv&quot; yEnc (1/2) 1478616">
    <groups>
      <group>alt.binaries.boneless</group>
    </groups>
    <segments>
      <segment bytes="739067" number="1">9cacde4c986547369becbf97003fb2c5-9483514693959@example</segment>
      <segment bytes="739549" number="2">70a3a038ce324e618e2751e063d6a036-7285710986748@example</segment>
    </segments>
  </file>
</nzb>
"#;

/// Build a `<file>` element with one segment per size
pub fn file_xml(name: &str, sizes: &[u64]) -> String {
    let segments: String = sizes
        .iter()
        .enumerate()
        .map(|(i, size)| {
            format!(
                "      <segment bytes=\"{size}\" number=\"{}\">{name}.{i}@example</segment>\n",
                i + 1
            )
        })
        .collect();
    format!(
        "  <file poster=\"poster@example\" date=\"1706440708\" subject=\"&quot;{name}&quot; yEnc\">\n    <groups>\n      <group>alt.binaries.test</group>\n    </groups>\n    <segments>\n{segments}    </segments>\n  </file>\n"
    )
}

/// Wrap `<file>` elements (and an optional head) in an NZB document
pub fn nzb_xml(head: &str, files: &[String]) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<nzb xmlns=\"http://www.newzbin.com/DTD/2003/nzb\">\n{head}{}</nzb>\n",
        files.concat()
    )
}

/// The part of `xml` from the first `<file` to the end
pub fn item_section(xml: &str) -> &str {
    &xml[xml.find("<file").unwrap_or(xml.len())..]
}
