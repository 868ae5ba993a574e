//! "Learn more" links matched against concern text.

use crate::domain::{MetricKind, Resource};

/// Most links attached to one result.
pub const MAX_RESOURCES: usize = 3;
/// Fewest links attached to one result.
pub const MIN_RESOURCES: usize = 2;

type Link = (&'static str, &'static str);

struct Topic {
    keywords: &'static [&'static str],
    links: &'static [Link],
}

struct ResourceTable {
    topics: &'static [Topic],
    defaults: &'static [Link],
}

const SECURITY: ResourceTable = ResourceTable {
    topics: &[
        Topic {
            keywords: &["sql injection", "injection"],
            links: &[
                ("SQL Injection Prevention Cheat Sheet", "https://cheatsheetseries.owasp.org/cheatsheets/SQL_Injection_Prevention_Cheat_Sheet.html"),
                ("OWASP Injection", "https://owasp.org/Top10/A03_2021-Injection/"),
            ],
        },
        Topic {
            keywords: &["xss", "cross-site scripting", "cross site scripting"],
            links: &[(
                "Cross Site Scripting Prevention Cheat Sheet",
                "https://cheatsheetseries.owasp.org/cheatsheets/Cross_Site_Scripting_Prevention_Cheat_Sheet.html",
            )],
        },
        Topic {
            keywords: &["password", "credential", "hardcoded", "hard-coded", "secret", "api key"],
            links: &[
                ("Secrets Management Cheat Sheet", "https://cheatsheetseries.owasp.org/cheatsheets/Secrets_Management_Cheat_Sheet.html"),
                ("Password Storage Cheat Sheet", "https://cheatsheetseries.owasp.org/cheatsheets/Password_Storage_Cheat_Sheet.html"),
            ],
        },
        Topic {
            keywords: &["authentication", "authorization", "session", "access control"],
            links: &[
                ("Authentication Cheat Sheet", "https://cheatsheetseries.owasp.org/cheatsheets/Authentication_Cheat_Sheet.html"),
                ("Broken Access Control", "https://owasp.org/Top10/A01_2021-Broken_Access_Control/"),
            ],
        },
        Topic {
            keywords: &["input validation", "validate", "sanitiz", "untrusted"],
            links: &[(
                "Input Validation Cheat Sheet",
                "https://cheatsheetseries.owasp.org/cheatsheets/Input_Validation_Cheat_Sheet.html",
            )],
        },
        Topic {
            keywords: &["crypto", "encrypt", "hash", "random"],
            links: &[(
                "Cryptographic Storage Cheat Sheet",
                "https://cheatsheetseries.owasp.org/cheatsheets/Cryptographic_Storage_Cheat_Sheet.html",
            )],
        },
        Topic {
            keywords: &["command", "shell", "exec", "eval"],
            links: &[(
                "OS Command Injection Defense Cheat Sheet",
                "https://cheatsheetseries.owasp.org/cheatsheets/OS_Command_Injection_Defense_Cheat_Sheet.html",
            )],
        },
        Topic {
            keywords: &["path traversal", "file path", "directory traversal"],
            links: &[("Path Traversal", "https://owasp.org/www-community/attacks/Path_Traversal")],
        },
        Topic {
            keywords: &["deserializ", "pickle"],
            links: &[(
                "Deserialization Cheat Sheet",
                "https://cheatsheetseries.owasp.org/cheatsheets/Deserialization_Cheat_Sheet.html",
            )],
        },
        Topic {
            keywords: &["error handling", "exception", "logging", "stack trace"],
            links: &[(
                "Error Handling Cheat Sheet",
                "https://cheatsheetseries.owasp.org/cheatsheets/Error_Handling_Cheat_Sheet.html",
            )],
        },
    ],
    defaults: &[
        ("OWASP Top Ten", "https://owasp.org/www-project-top-ten/"),
        ("OWASP Cheat Sheet Series", "https://cheatsheetseries.owasp.org/"),
        ("CWE Top 25 Most Dangerous Software Weaknesses", "https://cwe.mitre.org/top25/"),
    ],
};

const EFFICIENCY: ResourceTable = ResourceTable {
    topics: &[
        Topic {
            keywords: &["time complexity", "big o", "o(n"],
            links: &[
                ("Big O Notation Explained", "https://www.freecodecamp.org/news/big-o-notation-why-it-matters-and-why-it-doesnt-1674cfa8a23c/"),
                ("Time Complexity Analysis", "https://www.geeksforgeeks.org/analysis-of-algorithms-set-1-asymptotic-analysis/"),
            ],
        },
        Topic {
            keywords: &["space complexity"],
            links: &[("Understanding Space Complexity", "https://www.baeldung.com/cs/space-complexity")],
        },
        Topic {
            keywords: &["algorithm"],
            links: &[
                ("Algorithm Design Manual", "https://www.algorist.com/"),
                ("Efficient Algorithm Design", "https://algs4.cs.princeton.edu/home/"),
            ],
        },
        Topic {
            keywords: &["data structure"],
            links: &[("Choosing the Right Data Structure", "https://www.geeksforgeeks.org/data-structures/")],
        },
        Topic {
            keywords: &["loop"],
            links: &[("Loop Optimization Techniques", "https://www.geeksforgeeks.org/loop-optimization-in-c-cpp/")],
        },
        Topic {
            keywords: &["cach"],
            links: &[(
                "Caching Strategies Explained",
                "https://codeahoy.com/2017/08/11/caching-strategies-and-how-to-choose-the-right-one/",
            )],
        },
        Topic {
            keywords: &["memoiz"],
            links: &[("Memoization in Dynamic Programming", "https://www.geeksforgeeks.org/memoization-1d-2d-and-3d/")],
        },
        Topic {
            keywords: &["database", "query", "sql"],
            links: &[("Use The Index, Luke", "https://use-the-index-luke.com/")],
        },
        Topic {
            keywords: &["network", "request"],
            links: &[(
                "Network Optimization Techniques",
                "https://www.cloudflare.com/learning/network-layer/network-optimization/",
            )],
        },
        Topic {
            keywords: &["api call", "api request"],
            links: &[(
                "RESTful API Best Practices",
                "https://stackoverflow.blog/2020/03/02/best-practices-for-rest-api-design/",
            )],
        },
        Topic {
            keywords: &["memory", "allocation"],
            links: &[("Reducing Memory Leaks", "https://www.baeldung.com/java-memory-leaks")],
        },
        Topic {
            keywords: &["redundant", "function"],
            links: &[("Function Optimization Strategies", "https://refactoring.guru/")],
        },
        Topic {
            keywords: &["parallel", "concurren", "async"],
            links: &[("Concurrency Is Not Parallelism", "https://go.dev/blog/waza-talk")],
        },
    ],
    defaults: &[
        ("Performance Optimization Techniques", "https://web.dev/fast/"),
        ("Code Optimization Guide", "https://www.geeksforgeeks.org/optimization-techniques-program-optimization/"),
        ("Algorithmic Efficiency", "https://en.wikipedia.org/wiki/Algorithmic_efficiency"),
    ],
};

const QUALITY: ResourceTable = ResourceTable {
    topics: &[
        Topic {
            keywords: &["naming", "variable name", "unclear name"],
            links: &[("Naming Things", "https://refactoring.guru/refactoring/techniques/simplifying-method-calls/rename-method")],
        },
        Topic {
            keywords: &["duplicat", "repeated code"],
            links: &[("Duplicate Code", "https://refactoring.guru/smells/duplicate-code")],
        },
        Topic {
            keywords: &["long function", "long method", "too long", "complex"],
            links: &[
                ("Long Method", "https://refactoring.guru/smells/long-method"),
                ("Cyclomatic Complexity", "https://en.wikipedia.org/wiki/Cyclomatic_complexity"),
            ],
        },
        Topic {
            keywords: &["comment", "documentation", "docstring"],
            links: &[(
                "Best Practices for Writing Code Comments",
                "https://stackoverflow.blog/2021/12/23/best-practices-for-writing-code-comments/",
            )],
        },
        Topic {
            keywords: &["magic number", "hardcoded", "hard-coded"],
            links: &[(
                "Replace Magic Number with Symbolic Constant",
                "https://refactoring.guru/replace-magic-number-with-symbolic-constant",
            )],
        },
        Topic {
            keywords: &["error handling", "exception"],
            links: &[("Error Handling", "https://doc.rust-lang.org/book/ch09-00-error-handling.html")],
        },
        Topic {
            keywords: &["test"],
            links: &[("Unit Testing Principles", "https://martinfowler.com/bliki/UnitTest.html")],
        },
        Topic {
            keywords: &["global", "coupling", "modular"],
            links: &[("Coupling and Cohesion", "https://en.wikipedia.org/wiki/Coupling_(computer_programming)")],
        },
    ],
    defaults: &[
        ("Refactoring Catalog", "https://refactoring.com/catalog/"),
        ("Code Smells", "https://refactoring.guru/refactoring/smells"),
        ("Google Engineering Practices", "https://google.github.io/eng-practices/"),
    ],
};

fn table(metric: MetricKind) -> &'static ResourceTable {
    match metric {
        MetricKind::Security => &SECURITY,
        MetricKind::Efficiency => &EFFICIENCY,
        MetricKind::Quality => &QUALITY,
    }
}

fn to_resource((title, url): &Link) -> Resource {
    Resource {
        title: (*title).to_string(),
        url: (*url).to_string(),
    }
}

/// Pick between two and three links for the given concerns.
///
/// Each concern is matched case-insensitively against the metric's topic
/// keywords; the first link of every newly matched topic is taken in
/// discovery order. Placeholder concerns never match. Defaults fill the gap
/// when fewer than two topics matched.
pub fn resources_for(metric: MetricKind, concerns: &[String]) -> Vec<Resource> {
    let table = table(metric);
    let mut matched = vec![false; table.topics.len()];
    let mut picked: Vec<Resource> = Vec::new();

    'concerns: for concern in concerns {
        if metric.is_placeholder(concern) {
            continue;
        }
        let lowered = concern.to_lowercase();
        for (index, topic) in table.topics.iter().enumerate() {
            if matched[index] || !topic.keywords.iter().any(|kw| lowered.contains(kw)) {
                continue;
            }
            matched[index] = true;
            if let Some(link) = topic.links.first() {
                let resource = to_resource(link);
                if !picked.iter().any(|existing| existing.url == resource.url) {
                    picked.push(resource);
                }
            }
            if picked.len() >= MAX_RESOURCES {
                break 'concerns;
            }
        }
    }

    for link in table.defaults {
        if picked.len() >= MIN_RESOURCES {
            break;
        }
        let resource = to_resource(link);
        if !picked.iter().any(|existing| existing.url == resource.url) {
            picked.push(resource);
        }
    }

    picked
}
