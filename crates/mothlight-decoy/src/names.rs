//! Name pool for link generation. Three random picks joined with dashes make
//! a subdomain; the same picks joined with spaces make the link title.

pub const NAMES: &[&str] = &[
    "Jacob",
    "Mason",
    "William",
    "Jayden",
    "Noah",
    "Michael",
    "Ethan",
    "Alexander",
    "Aiden",
    "Daniel",
    "Anthony",
    "Matthew",
    "Elijah",
    "Joshua",
    "Liam",
    "Andrew",
    "James",
    "David",
    "Benjamin",
    "Christopher",
    "Logan",
    "Joseph",
    "Jackson",
    "Gabriel",
    "Ryan",
    "Samuel",
    "John",
    "Nathan",
    "Lucas",
    "Christian",
    "Jonathan",
    "Caleb",
    "Dylan",
    "Landon",
    "Isaac",
    "Gavin",
    "Tyler",
    "Luke",
    "Evan",
    "Carter",
    "Nicholas",
    "Isaiah",
    "Owen",
    "Jack",
    "Jordan",
    "Brandon",
    "Wyatt",
    "Julian",
    "Aaron",
    "Levi",
    "Sophia",
    "Emma",
    "Isabella",
    "Olivia",
    "Ava",
    "Emily",
    "Abigail",
    "Mia",
    "Madison",
    "Elizabeth",
    "Chloe",
    "Ella",
    "Avery",
    "Addison",
    "Aubrey",
    "Lily",
    "Natalie",
    "Sofia",
    "Charlotte",
    "Zoey",
    "Grace",
    "Hannah",
    "Amelia",
    "Harper",
    "Lillian",
    "Samantha",
    "Evelyn",
    "Victoria",
    "Brooklyn",
    "Zoe",
    "Layla",
    "Hailey",
    "Leah",
    "Kaylee",
    "Anna",
    "Aaliyah",
    "Gabriella",
    "Allison",
    "Nevaeh",
    "Alexis",
    "Audrey",
    "Savannah",
    "Sarah",
    "Alyssa",
    "Claire",
    "Taylor",
    "Riley",
    "Camila",
    "Arianna",
    "Ashley",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_subdomain_safe() {
        for name in NAMES {
            assert!(
                name.chars().all(|c| c.is_ascii_alphanumeric()),
                "{name} would not survive as a DNS label"
            );
        }
    }
}
