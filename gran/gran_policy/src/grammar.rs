//! Grammar for the preprocessed policy text.
//!
//! The preprocessor has already flattened the policy: braces are gone,
//! so role and subject structure is implied by statement order and the
//! parser re-folds it. The grammar is line-oriented; every statement
//! must consume its whole line.

use pest_derive::Parser;

#[derive(Parser)]
#[grammar_inline = r#"
WHITESPACE = _{ " " | "\t" | "\r" }

ident_char = _{ ASCII_ALPHANUMERIC | "_" | "-" | "." }
ident      = @{ ident_char+ }

path_char = _{ ASCII_ALPHANUMERIC | "*" | "?" | "." | "_" | "-" | "+" | "[" | "]" | "!" | "," | "~" | "/" }
path      = @{ "/" ~ path_char* }

kw_role        = @{ "role" ~ !ident_char }
kw_domain      = @{ "domain" ~ !ident_char }
kw_subject     = @{ "subject" ~ !ident_char }
kw_transitions = @{ "role_transitions" ~ !ident_char }
kw_user_allow  = @{ "user_transition_allow" ~ !ident_char }
kw_user_deny   = @{ "user_transition_deny" ~ !ident_char }
kw_group_allow = @{ "group_transition_allow" ~ !ident_char }
kw_group_deny  = @{ "group_transition_deny" ~ !ident_char }
kw_connect     = @{ "connect_reserved" ~ !ident_char }
kw_bind        = @{ "bind_reserved" ~ !ident_char }
kw_sock_family = @{ "sock_allow_family" ~ !ident_char }
kw_ip_override = @{ "ip_override" ~ !ident_char }
kw_disabled    = @{ "disabled" ~ !ident_char }

cap_token = @{ ("+" | "-") ~ "CAP_" ~ ident_char+ }
pax_token = @{ ("+" | "-") ~ "PAX_" ~ ident_char+ }
res_name  = @{ "RES_" ~ ident_char+ }
limit     = @{ "unlimited" | ASCII_DIGIT+ ~ ASCII_ALPHA* }

ip4        = @{ ASCII_DIGIT{1,3} ~ ("." ~ ASCII_DIGIT{1,3}){3} }
port_range = @{ ASCII_DIGIT+ ~ ("-" ~ ASCII_DIGIT+)? }
addr       = @{ ip4 ~ ("/" ~ ASCII_DIGIT{1,2})? ~ (":" ~ port_range)? }
sock_spec  = { kw_disabled | addr ~ ident* | path ~ ident* }

role_stmt        = { kw_role ~ ident ~ ident? }
domain_stmt      = { kw_domain ~ ident ~ ident ~ ident+ }
transitions_stmt = { kw_transitions ~ ident+ }
subject_stmt     = { kw_subject ~ path ~ nested_path? ~ ident? }
nested_path      = { ":" ~ path }
user_allow_stmt  = { kw_user_allow ~ ident+ }
user_deny_stmt   = { kw_user_deny ~ ident+ }
group_allow_stmt = { kw_group_allow ~ ident+ }
group_deny_stmt  = { kw_group_deny ~ ident+ }
cap_stmt         = { cap_token }
pax_stmt         = { pax_token }
res_stmt         = { res_name ~ limit ~ limit }
connect_stmt     = { kw_connect ~ sock_spec? }
bind_stmt        = { kw_bind ~ sock_spec? }
sock_family_stmt = { kw_sock_family ~ ident+ }
ip_override_stmt = { kw_ip_override ~ addr }
object_stmt      = { path ~ ident? }

stmt = _{
    transitions_stmt
  | role_stmt
  | domain_stmt
  | subject_stmt
  | user_allow_stmt
  | user_deny_stmt
  | group_allow_stmt
  | group_deny_stmt
  | cap_stmt
  | pax_stmt
  | res_stmt
  | connect_stmt
  | bind_stmt
  | sock_family_stmt
  | ip_override_stmt
  | object_stmt
}

policy = { SOI ~ NEWLINE* ~ stmt? ~ (NEWLINE+ ~ stmt)* ~ NEWLINE* ~ EOI }
"#]
pub struct PolicyParser;
