use std::error::Error;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use textstream::xml::*;

fn call_unwrap<F: FnOnce() -> Result<(), Box<dyn Error>>>(f: F) {
    f().unwrap();
}

fn bench_xml(c: &mut Criterion, name: &str, xml: &str) {
    let mut group = c.benchmark_group(name);

    group.bench_with_input("textstream-token", xml, |b, xml| {
        b.iter(|| {
            call_unwrap(|| {
                let mut decoder = XmlDecoder::from_bytes(xml.as_bytes());
                while let Some(token) = decoder.token()? {
                    black_box(token);
                }
                Ok(())
            });
        })
    });

    group.bench_with_input("textstream-raw-token", xml, |b, xml| {
        b.iter(|| {
            call_unwrap(|| {
                let mut decoder = XmlDecoder::from_bytes(xml.as_bytes());
                while let Some(token) = decoder.raw_token()? {
                    black_box(token);
                }
                Ok(())
            });
        })
    });

    let mut decoder = XmlDecoder::from_bytes(xml.as_bytes());
    let mut tokens = Vec::new();
    while let Some(token) = decoder.token().unwrap() {
        tokens.push(token);
    }
    group.bench_with_input("textstream-encode", &tokens, |b, tokens| {
        b.iter(|| {
            call_unwrap(|| {
                let mut encoder = XmlEncoder::new(Vec::new());
                for token in tokens {
                    encoder.encode_token(token)?;
                }
                encoder.close()?;
                black_box(encoder.into_inner());
                Ok(())
            });
        })
    });

    group.finish();
}

fn benchmark_many_elements(c: &mut Criterion) {
    let xml = format!(
        "<list>{}</list>",
        "<item id=\"1\" kind='plain'><name>abcdabcdabcdabcd</name><value>12345</value></item>"
            .repeat(1000)
    );
    bench_xml(c, "xml-many-elements", &xml);
}

fn benchmark_namespaces(c: &mut Criterion) {
    let xml = format!(
        "<r xmlns='urn:a' xmlns:b='urn:b'>{}</r>",
        "<b:item b:id='1'><child xmlns='urn:c' attr='x'/></b:item>".repeat(1000)
    );
    bench_xml(c, "xml-namespaces", &xml);
}

fn benchmark_text_with_entities(c: &mut Criterion) {
    let xml = format!(
        "<text>{}</text>",
        "Fish &amp; chips &lt;cheap&gt; &#169; caf\u{E9}\n".repeat(1000)
    );
    bench_xml(c, "xml-text-entities", &xml);
}

criterion_group!(
    benches,
    // Benchmark functions
    benchmark_many_elements,
    benchmark_namespaces,
    benchmark_text_with_entities
);
criterion_main!(benches);
