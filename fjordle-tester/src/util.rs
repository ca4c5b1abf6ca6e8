pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_trims_and_skips_blanks() {
        assert_eq!(
            split_csv(" smoke, ,share-text,,"),
            vec!["smoke".to_string(), "share-text".to_string()]
        );
        assert!(split_csv("").is_empty());
    }
}
