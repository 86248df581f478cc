use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$")
        .expect("email regex")
});

pub fn simplify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| match c {
            '1' => 'i',
            '3' => 'e',
            '4' => 'a',
            '5' => 's',
            '7' => 't',
            '8' => 'b',
            '0' => 'o',
            '$' => 's',
            '!' => 'i',
            _ => c,
        })
        .collect()
}

pub fn username(name: &str) -> Result<(), &'static str> {
    if !(3..32).contains(&name.len()) {
        return Err("username: length out of range");
    }

    let banned_keywords = ["admin", "administrator", "moderator", "mateugram"];

    let simplified_name: String = simplify(name);

    if banned_keywords
        .iter()
        .any(|keyword| simplified_name.as_str().contains(*keyword))
    {
        return Err("username: banned keyword");
    }

    if name
        .chars()
        .any(|x| !x.is_ascii_alphanumeric() && !x.is_ascii_punctuation())
    {
        return Err("username: disallowed characters");
    }

    // usernames end up in /u/{username}, which actix percent-decodes
    if name.contains(&['/', '?', '#', '%'][..]) {
        return Err("username: disallowed characters");
    }

    Ok(())
}

pub fn password(password: &str) -> Result<(), &'static str> {
    if !(8..).contains(&password.len()) {
        return Err("password: too short");
    }

    Ok(())
}

pub fn email(email: &str) -> Result<(), &'static str> {
    if email.len() > 254 || !EMAIL.is_match(email) {
        return Err("email: invalid address");
    }

    Ok(())
}

pub fn display_name(name: &str) -> Result<(), &'static str> {
    if name.chars().count() > 50 {
        return Err("display name: too long");
    }

    if name.chars().any(char::is_control) {
        return Err("display name: disallowed characters");
    }

    Ok(())
}

pub fn bio(bio: &str) -> Result<(), &'static str> {
    if bio.chars().count() > 300 {
        return Err("bio: too long");
    }

    Ok(())
}

pub fn caption(caption: &str) -> Result<(), &'static str> {
    if caption.chars().count() > 2200 {
        return Err("caption: too long");
    }

    Ok(())
}

pub fn comment(body: &str) -> Result<(), &'static str> {
    let body = body.trim();

    if body.is_empty() {
        return Err("comment: empty");
    }

    if body.chars().count() > 500 {
        return Err("comment: too long");
    }

    Ok(())
}

#[test]
fn username_validation() {
    username("mateu").unwrap();
    username("xd").unwrap_err();
    username("RealMan420").unwrap();
    username("G3N1U5").unwrap();
    username("__").unwrap_err();
    username("oisdhfoashdfgohasdopfh").unwrap();
    username("adm1n").unwrap_err();
    username("4dministrator_2").unwrap_err();
    username("m4teugr4m").unwrap_err();
    username("normalname\n").unwrap_err();
    username("name with space").unwrap_err();
    username("ünicode").unwrap_err();
    username("slash/name").unwrap_err();
    username("%41nna").unwrap_err();
    username("anna%20").unwrap_err();
    username("a".repeat(32).as_str()).unwrap_err();
    username("a".repeat(31).as_str()).unwrap();
}

#[test]
fn password_validation() {
    password("123456").unwrap_err();
    password("aa").unwrap_err();
    password("12345678").unwrap();
    password(".6WV@Ud35VBnHeOiK&F!kr':Sh+s90v$").unwrap();
}

#[test]
fn email_validation() {
    email("someone@example.com").unwrap();
    email("first.last+tag@mail.example.co").unwrap();
    email("no-at-sign.example.com").unwrap_err();
    email("someone@localhost").unwrap_err();
    email("some one@example.com").unwrap_err();
    email(&format!("{}@example.com", "a".repeat(250))).unwrap_err();
}

#[test]
fn text_field_validation() {
    display_name("Mateu").unwrap();
    display_name(&"x".repeat(51)).unwrap_err();
    display_name("tab\there").unwrap_err();

    bio(&"é".repeat(300)).unwrap();
    bio(&"é".repeat(301)).unwrap_err();

    caption("").unwrap();
    caption(&"x".repeat(2201)).unwrap_err();

    comment("nice!").unwrap();
    comment("   ").unwrap_err();
    comment(&"x".repeat(501)).unwrap_err();
}

#[test]
fn simplification_validation() {
    assert_eq!(simplify("$1mple"), "simple");
    assert_eq!(simplify("genius"), "genius");
    assert_eq!(simplify("g3n1u5"), "genius");
    assert_eq!(simplify("G3N1U5"), "genius");
    assert_eq!(simplify("l0lh4x0r"), "lolhaxor");
}
