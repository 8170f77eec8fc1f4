//! The decoy surface: a harmless, link-rich page rendered by plain value
//! substitution.
//!
//! Nothing in this crate has state. Every request gets the same embedded
//! template filled with a host-derived display name, a placeholder image and
//! seven freshly randomized links one subdomain deeper into the decoy, so a
//! client that follows links never runs out of pages to fetch. Classification
//! of who is worth counting lives in [`signatures`]; the telemetry sink
//! itself never decides.

pub mod names;
pub mod signatures;

use rand::Rng;

/// Number of links on the rendered page.
pub const LINK_COUNT: usize = 7;

/// Display name used when the request host carries no subdomain label.
const DEFAULT_DISPLAY_NAME: &str = "Moxie";

/// Server banners rotated across responses so the decoy never advertises a
/// consistent stack.
const SERVER_BANNERS: &[&str] = &[
    "Apache/2.4.41 (Unix)",
    "nginx/1.18.0",
    "Microsoft-IIS/10.0",
    "LiteSpeed",
    "Apache Tomcat/9.0.37",
    "Jetty(9.4.28)",
    "Express",
    "Caddy",
    "Cherokee/1.2.104",
    "Kestrel",
    "gunicorn/20.0.4",
    "CherryPy/18.6.0",
    "Puma 4.3.5 (ruby 2.7.1-p158)",
    "Unicorn 5.6.2",
    "TornadoServer/6.0.4",
    "WildFly/21",
    "GlassFish Server Open Source Edition 5.0",
    "Oracle-Application-Server-11g",
    "Zope/(2.13.29, python 2.7.18, linux2) ZServer/1.1",
    "Resin/4.0.48",
];

/// Inline data-URI artwork so the page needs no asset fetches.
const IMG_TAG: &str = concat!(
    "<img alt=\"the lighthouse moth\" title=\"the lighthouse moth\" ",
    "src=\"data:image/svg+xml,%3Csvg xmlns='http://www.w3.org/2000/svg' ",
    "viewBox='0 0 120 120'%3E%3Crect width='120' height='120' ",
    "fill='%23575cf5'/%3E%3Ccircle cx='60' cy='48' r='26' ",
    "fill='%23eeac0e'/%3E%3Cpath d='M34 92 Q60 64 86 92' stroke='%23db56db' ",
    "stroke-width='6' fill='none'/%3E%3C/svg%3E\">",
);

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8" >
    <meta name="viewport" content="width=device-width" >
    <title>The lighthouse at the quiet end of the internet</title>
    <style>
        body {
            font-family: "monospace";
            margin: 20px;
            padding: 20px;
            background-color: #575cf5;
            color: #e8c4c2;
        }
        img {
            width: 100%;
            max-width: 500px;
            filter: drop-shadow(5px 5px 0px #3f4299);
            border: 3px solid #db56db;
            border-radius: 2px;
        }
        a {
            color: #eeac0e;
            padding: 4px;
            display: block;
        }
        h1 {
            color: #eeac0e;
        }
    </style>
</head>

<body>
    <div style="width:50%;">
        <h1>The lighthouse at the quiet end of the internet</h1>

        Meet <strong>{{current_name}}</strong>, the moth who keeps this little
        lighthouse burning. Visitors rarely come this far out, so every one of
        them gets the full tour.

        <p>The lamp room is just through here.</p>

        {{img}}

        <p>Friends of the lighthouse:</p>

        <p>
            <a href="{{link1}}">{{link1_title}}</a>
            <a href="{{link2}}">{{link2_title}}</a>
            <a href="{{link3}}">{{link3_title}}</a>
            <a href="{{link4}}">{{link4_title}}</a>
            <a href="{{link5}}">{{link5_title}}</a>
            <a href="{{link6}}">{{link6_title}}</a>
            <a href="{{link7}}">{{link7_title}}</a>
        </p>
    </div>
</body>
</html>
"#;

/// One generated decoy link.
#[derive(Debug, Clone)]
pub struct DecoyLink {
    pub href: String,
    pub title: String,
}

/// Derive the page's display name from the request Host header: first DNS
/// label, dashes to spaces, title-cased. Hosts without a dot get the fixed
/// default.
pub fn display_name_from_host(host: &str) -> String {
    let Some((label, _)) = host.split_once('.') else {
        return DEFAULT_DISPLAY_NAME.to_string();
    };
    title_case(&label.replace('-', " "))
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Join three random names into a link one subdomain deeper into the decoy.
pub fn random_link(domain: &str) -> DecoyLink {
    let mut rng = rand::thread_rng();
    let mut pick = || names::NAMES[rng.gen_range(0..names::NAMES.len())];
    let (a, b, c) = (pick(), pick(), pick());

    let subdomain = format!("{a}-{b}-{c}").to_lowercase();
    DecoyLink {
        href: format!("http://{subdomain}.{domain}/"),
        title: format!("{a} {b} {c}"),
    }
}

/// Random Server banner for response headers.
pub fn random_server_banner() -> &'static str {
    SERVER_BANNERS[rand::thread_rng().gen_range(0..SERVER_BANNERS.len())]
}

/// Render the decoy page for one request.
///
/// `host` is the inbound Host header (display name); `domain` is the
/// authority the generated links point back into.
pub fn render_page(host: &str, domain: &str) -> String {
    let mut content = PAGE_TEMPLATE.replace("{{img}}", IMG_TAG);
    content = content.replace("{{current_name}}", &display_name_from_host(host));

    for i in 1..=LINK_COUNT {
        let link = random_link(domain);
        content = content.replace(&format!("{{{{link{i}}}}}"), &link.href);
        content = content.replace(&format!("{{{{link{i}_title}}}}"), &link.title);
    }

    content
}
