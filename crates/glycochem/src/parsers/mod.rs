pub mod errors;

use nom::{
    Finish,
    character::complete::{alpha1, anychar, char, u32},
    combinator::{cut, map_opt},
    multi::many0,
    sequence::{delimited, pair},
};

use crate::{Composition, MONOSACCHARIDE_KINDS, Monosaccharide};

use errors::{CompositionError, CompositionErrorKind, ParseFailure, ParseResult, expect};

/// Composition = Residue Count , { Residue Count } ;
pub fn composition(i: &str) -> ParseResult<Composition> {
    let mut counts = [0; MONOSACCHARIDE_KINDS];
    let mut seen = [false; MONOSACCHARIDE_KINDS];
    let mut rest = i;
    loop {
        match residue_count(rest) {
            Ok((next, (monosaccharide, count))) => {
                let slot = monosaccharide.slot();
                if seen[slot] {
                    let kind = CompositionErrorKind::RepeatedMonosaccharide(monosaccharide);
                    let error = ParseFailure::new(rest, kind).spanning(rest.len() - next.len());
                    return Err(nom::Err::Failure(error));
                }
                seen[slot] = true;
                counts[slot] = count;
                rest = next;
            }
            // NOTE: Only the first residue is mandatory, so later recoverable errors just end the composition
            Err(nom::Err::Error(_)) if rest.len() < i.len() => {
                return Ok((rest, Composition::from_counts(counts)));
            }
            Err(e) => return Err(e),
        }
    }
}

/// Residue Count = Residue , "(" , digit , { digit } , ")" ;
fn residue_count(i: &str) -> ParseResult<(Monosaccharide, u32)> {
    let count = delimited(
        expect(char('('), CompositionErrorKind::ExpectedCountStart),
        expect(u32, CompositionErrorKind::ExpectedCount),
        expect(char(')'), CompositionErrorKind::ExpectedCountEnd),
    );
    pair(monosaccharide_name, cut(count))(i)
}

/// Residue = "Hex" | "HexNAc" | "NeuAc" | "NeuGc" | "Fuc" | "Phospho" | "Sulfo" | "Na" | "Ac" | "Xylose" | "Kdn" ;
pub fn monosaccharide_name(i: &str) -> ParseResult<Monosaccharide> {
    let (rest, name) = expect(alpha1, CompositionErrorKind::ExpectedResidue)(i)?;
    Monosaccharide::from_name(name).map_or_else(
        || {
            let kind = CompositionErrorKind::UnknownMonosaccharide(name.to_owned());
            Err(nom::Err::Failure(ParseFailure::new(i, kind).spanning(name.len())))
        },
        |monosaccharide| Ok((rest, monosaccharide)),
    )
}

/// Structure = "(" , Code , { Structure } , ")" ;
pub fn structure(i: &str) -> ParseResult<Composition> {
    let (i, _) = expect(char('('), CompositionErrorKind::ExpectedNodeStart)(i)?;
    let (i, root) = cut(monosaccharide_code)(i)?;
    let (i, branches) = many0(structure)(i)?;
    let (i, _) = cut(expect(char(')'), CompositionErrorKind::ExpectedNodeEnd))(i)?;

    let composition = branches.into_iter().fold(Composition::from(root), |a, b| a + b);
    Ok((i, composition))
}

/// Code = "H" | "N" | "A" | "G" | "F" | "P" | "S" | "Y" | "C" | "X" | "K" ;
pub fn monosaccharide_code(i: &str) -> ParseResult<Monosaccharide> {
    let parser = map_opt(anychar, Monosaccharide::from_code);
    expect(parser, CompositionErrorKind::ExpectedCode)(i)
        .map_err(|e| e.map(|failure| failure.spanning(i.chars().next().map_or(0, char::len_utf8))))
}

// ---------------------------------------------------------------------------------------------------------------------

/// Runs `parser` to completion, converting any failure into a self-contained [`CompositionError`]
pub(crate) fn final_parser<'a, O>(
    mut parser: impl FnMut(&'a str) -> ParseResult<'a, O>,
) -> impl FnMut(&'a str) -> Result<O, CompositionError> {
    move |input| {
        let (rest, output) = parser(input)
            .finish()
            .map_err(|e| e.into_final_error(input))?;
        if rest.is_empty() {
            Ok(output)
        } else {
            let error = ParseFailure::new(rest, CompositionErrorKind::ExpectedEoi);
            Err(error.spanning(rest.len()).into_final_error(input))
        }
    }
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;
    use miette::SourceSpan;

    use super::*;

    fn kind_of(result: Result<Composition, CompositionError>) -> CompositionErrorKind {
        result.unwrap_err().kind().clone()
    }

    #[test]
    fn test_monosaccharide_name() {
        for monosaccharide in Monosaccharide::ALL {
            assert_eq!(
                monosaccharide_name(monosaccharide.name()),
                Ok(("", monosaccharide))
            );
        }
        assert_eq!(monosaccharide_name("HexNAc(1)"), Ok(("(1)", Monosaccharide::HexNAc)));
        assert_eq!(monosaccharide_name("Hex(1)"), Ok(("(1)", Monosaccharide::Hex)));
        assert!(matches!(monosaccharide_name("Hexose(1)"), Err(nom::Err::Failure(_))));
        assert!(matches!(monosaccharide_name("(1)"), Err(nom::Err::Error(_))));
    }

    #[test]
    fn test_monosaccharide_code() {
        for monosaccharide in Monosaccharide::ALL {
            let code = monosaccharide.code().to_string();
            assert_eq!(monosaccharide_code(&code), Ok(("", monosaccharide)));
        }
        assert_eq!(monosaccharide_code("NH"), Ok(("H", Monosaccharide::HexNAc)));
        assert!(monosaccharide_code("Q").is_err());
        assert!(monosaccharide_code("").is_err());
    }

    #[test]
    fn test_composition() {
        let mut parse = final_parser(composition);
        assert_snapshot!(parse("HexNAc(2)Hex(5)").unwrap().to_string(), @"H5N2");
        assert_snapshot!(parse("Hex(5)HexNAc(2)").unwrap().to_string(), @"H5N2");
        assert_snapshot!(
            parse("HexNAc(4)Hex(5)Fuc(1)NeuAc(2)NeuGc(1)").unwrap().to_string(),
            @"H5N4A2G1F1"
        );
        assert_snapshot!(
            parse("Phospho(1)Sulfo(2)Na(3)Ac(4)Xylose(5)Kdn(6)").unwrap().to_string(),
            @"P1S2Y3C4X5K6"
        );
        assert_snapshot!(parse("HexNAc(12)Hex(0)").unwrap().to_string(), @"N12");
    }

    #[test]
    fn test_composition_errors() {
        let mut parse = final_parser(composition);
        assert_eq!(kind_of(parse("")), CompositionErrorKind::ExpectedResidue);
        assert_eq!(kind_of(parse("(2)")), CompositionErrorKind::ExpectedResidue);
        assert_eq!(
            kind_of(parse("HexNAc(2)Mystery(5)")),
            CompositionErrorKind::UnknownMonosaccharide("Mystery".to_owned())
        );
        assert_eq!(
            kind_of(parse("HexNAc(2)Hex(1)HexNAc(1)")),
            CompositionErrorKind::RepeatedMonosaccharide(Monosaccharide::HexNAc)
        );
        assert_eq!(kind_of(parse("HexNAc2")), CompositionErrorKind::ExpectedCountStart);
        assert_eq!(kind_of(parse("HexNAc()")), CompositionErrorKind::ExpectedCount);
        assert_eq!(kind_of(parse("HexNAc(2")), CompositionErrorKind::ExpectedCountEnd);
        assert_eq!(kind_of(parse("HexNAc(2) ")), CompositionErrorKind::ExpectedEoi);
    }

    #[test]
    fn test_composition_error_spans() {
        let mut parse = final_parser(composition);
        let error = parse("HexNAc(2)Mystery(5)").unwrap_err();
        assert_eq!(error.span(), SourceSpan::from((9_usize, 7_usize)));
        let error = parse("HexNAc(2)Hex(1)HexNAc(1)").unwrap_err();
        assert_eq!(error.span(), SourceSpan::from((15_usize, 9_usize)));
        let error = parse("HexNAc(2)!!").unwrap_err();
        assert_eq!(error.span(), SourceSpan::from((9_usize, 2_usize)));
        assert_snapshot!(error.to_string(), @"expected the end of input");
    }

    #[test]
    fn test_structure() {
        let mut parse = final_parser(structure);
        assert_snapshot!(parse("(N)").unwrap().to_string(), @"N1");
        assert_snapshot!(parse("(N(H))").unwrap().to_string(), @"H1N1");
        assert_snapshot!(parse("(N(H(A))(N(H(A))(F)))").unwrap().to_string(), @"H2N2A2F1");
        assert_snapshot!(parse("(N(F)(N(H(H(H))(H(H)))))").unwrap().to_string(), @"H5N2F1");
    }

    #[test]
    fn test_structure_errors() {
        let mut parse = final_parser(structure);
        assert_eq!(kind_of(parse("")), CompositionErrorKind::ExpectedNodeStart);
        assert_eq!(kind_of(parse("N(H)")), CompositionErrorKind::ExpectedNodeStart);
        assert_eq!(kind_of(parse("()")), CompositionErrorKind::ExpectedCode);
        assert_eq!(kind_of(parse("(Q)")), CompositionErrorKind::ExpectedCode);
        assert_eq!(kind_of(parse("(N(H)")), CompositionErrorKind::ExpectedNodeEnd);
        assert_eq!(kind_of(parse("(N(H)x)")), CompositionErrorKind::ExpectedNodeEnd);
        assert_eq!(kind_of(parse("(N)(H)")), CompositionErrorKind::ExpectedEoi);

        let error = parse("(N(Q))").unwrap_err();
        assert_eq!(error.span(), SourceSpan::from((3_usize, 1_usize)));
    }
}
