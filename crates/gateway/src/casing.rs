// RpcGate - JSON-RPC gateway for OpenAPI-described node APIs
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Identifier case conversion

/// Converts an identifier to lowerCamelCase.
///
/// Words are split on any non-alphanumeric character, on lower-to-upper
/// transitions, before the last capital of an acronym that starts a new word
/// (`APIInfo` splits as `API`, `Info`) and on letter/digit boundaries.
///
/// ```
/// use rpcgate_gateway::casing::lower_camel_case;
///
/// assert_eq!(lower_camel_case("get_ledger_info"), "getLedgerInfo");
/// assert_eq!(lower_camel_case("ledger-timestampusec"), "ledgerTimestampusec");
/// ```
pub fn lower_camel_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for (index, word) in split_words(input).iter().enumerate() {
        let mut chars = word.chars();
        let Some(first) = chars.next() else { continue };
        if index == 0 {
            out.extend(first.to_lowercase());
        } else {
            out.extend(first.to_uppercase());
        }
        out.extend(chars.flat_map(char::to_lowercase));
    }
    out
}

fn split_words(input: &str) -> Vec<&str> {
    let mut words = Vec::new();

    for segment in input.split(|c: char| !c.is_alphanumeric()).filter(|s| !s.is_empty()) {
        let chars: Vec<(usize, char)> = segment.char_indices().collect();
        let mut start = 0;

        for i in 1..chars.len() {
            let (offset, cur) = chars[i];
            let prev = chars[i - 1].1;
            let next = chars.get(i + 1).map(|&(_, c)| c);

            let boundary = (prev.is_lowercase() && cur.is_uppercase())
                || (prev.is_uppercase()
                    && cur.is_uppercase()
                    && next.is_some_and(char::is_lowercase))
                || (prev.is_alphabetic() && cur.is_numeric())
                || (prev.is_numeric() && cur.is_alphabetic());

            if boundary {
                words.push(&segment[start..offset]);
                start = offset;
            }
        }
        words.push(&segment[start..]);
    }

    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case_ids() {
        assert_eq!(lower_camel_case("get_ledger_info"), "getLedgerInfo");
        assert_eq!(lower_camel_case("get_account_resources"), "getAccountResources");
        assert_eq!(lower_camel_case("healthy"), "healthy");
    }

    #[test]
    fn test_already_camel_or_pascal() {
        assert_eq!(lower_camel_case("getAccount"), "getAccount");
        assert_eq!(lower_camel_case("GetAccount"), "getAccount");
        assert_eq!(lower_camel_case("getAPIInfo"), "getApiInfo");
        assert_eq!(lower_camel_case("URL"), "url");
    }

    #[test]
    fn test_header_style_keys() {
        assert_eq!(lower_camel_case("ledger-version"), "ledgerVersion");
        assert_eq!(lower_camel_case("chain-id"), "chainId");
        assert_eq!(lower_camel_case("oldest-block-height"), "oldestBlockHeight");
    }

    #[test]
    fn test_digits_and_separators() {
        assert_eq!(lower_camel_case("foo2bar"), "foo2Bar");
        assert_eq!(lower_camel_case("v1_accounts"), "v1Accounts");
        assert_eq!(lower_camel_case("__leading__trailing__"), "leadingTrailing");
        assert_eq!(lower_camel_case("--"), "");
        assert_eq!(lower_camel_case(""), "");
    }
}
